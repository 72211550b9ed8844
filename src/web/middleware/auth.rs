use salvo::http::header::AUTHORIZATION;
use salvo::prelude::*;
use serde_json::json;

use crate::resolver::{IdentityResolver, Resolution};

/// Depot key under which an authenticated request carries its userid.
pub const USERID_KEY: &str = "identity.userid";

/// Takes the credential out of an `Authorization: <scheme> <token>` header.
///
/// The scheme is not checked. A header with fewer than two fields carries no
/// token.
pub fn extract_token(header: &str) -> Option<&str> {
    header.split_whitespace().nth(1)
}

pub fn render_unauthorized(res: &mut Response) {
    res.status_code(StatusCode::UNAUTHORIZED);
    res.render(Json(json!({ "error": "unauthorized" })));
}

/// Rejects every request whose bearer token does not resolve to a user.
///
/// Both rejection reasons render the same response, so a caller cannot tell
/// an unknown token from an unavailable backend.
pub struct RequireIdentity {
    resolver: IdentityResolver,
}

impl RequireIdentity {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self { resolver }
    }
}

#[handler]
impl RequireIdentity {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_token)
            .map(str::to_owned);

        let Some(token) = token else {
            render_unauthorized(res);
            ctrl.skip_rest();
            return;
        };

        match self.resolver.resolve(&token).await {
            Resolution::Resolved { userid } => {
                depot.insert(USERID_KEY, userid);
            }
            Resolution::Rejected { .. } => {
                render_unauthorized(res);
                ctrl.skip_rest();
            }
        }
    }
}
