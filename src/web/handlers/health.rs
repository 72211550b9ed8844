use salvo::prelude::*;
use serde_json::json;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })));
}
