use salvo::prelude::*;
use salvo::writing::Text;

use crate::metrics::format_prometheus;

#[handler]
pub async fn metrics(res: &mut Response) {
    res.render(Text::Plain(format_prometheus()));
}
