use salvo::prelude::*;
use serde_json::json;

use crate::web::middleware::auth::{USERID_KEY, render_unauthorized};

/// Echoes the identity that `RequireIdentity` attached to the request.
#[handler]
pub async fn whoami(depot: &mut Depot, res: &mut Response) {
    match depot.get::<String>(USERID_KEY) {
        Ok(userid) => res.render(Json(json!({ "userid": userid }))),
        Err(_) => render_unauthorized(res),
    }
}
