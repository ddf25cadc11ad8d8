use std::sync::Arc;

use axum::{extract::State, response::Html};

use crate::router::ExporterState;

pub async fn landing_page(State(state): State<Arc<ExporterState>>) -> Html<String> {
    let collectors = state
        .scraper
        .collector_names()
        .map(|name| format!("<li>{name}</li>"))
        .collect::<String>();

    Html(format!(
        "<html>\n<head><title>hostex</title></head>\n<body>\n<h1>hostex</h1>\n\
<p><a href=\"{path}\">Metrics</a></p>\n<p><a href=\"/health\">Health</a></p>\n\
<h2>Enabled collectors</h2>\n<ul>{collectors}</ul>\n</body>\n</html>\n",
        path = state.metrics_path,
    ))
}
