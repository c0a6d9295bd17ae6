// src/web.rs
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tracing::{info, warn};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::artifact::ArtifactIndex;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

fn error_reply(status: StatusCode, error: &str, details: Option<String>) -> Response {
    reply::with_status(
        reply::json(&ErrorResponse {
            error: error.to_string(),
            details,
        }),
        status,
    )
    .into_response()
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "pagereport"
    })))
}

async fn list_graphs(index: Arc<ArtifactIndex>) -> Result<Response, Rejection> {
    match index.list() {
        Ok(entries) => Ok(reply::json(&entries).into_response()),
        Err(e) => {
            warn!(error = %e, "listing artifacts failed");
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Listing failed",
                Some(e.to_string()),
            ))
        }
    }
}

async fn serve_graph(id: String, index: Arc<ArtifactIndex>) -> Result<Response, Rejection> {
    let entry = match index.resolve(&id) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            return Ok(error_reply(
                StatusCode::NOT_FOUND,
                "No such graph",
                Some(id),
            ))
        }
        Err(e) => {
            warn!(id = %id, error = %e, "resolving artifact failed");
            return Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Lookup failed",
                Some(e.to_string()),
            ));
        }
    };

    match tokio::fs::read_to_string(&entry.path).await {
        Ok(html) => {
            info!(id = %id, file = %entry.file_name, "serving graph");
            Ok(reply::html(html).into_response())
        }
        Err(e) => {
            warn!(path = %entry.path.display(), error = %e, "reading artifact failed");
            Ok(error_reply(
                StatusCode::NOT_FOUND,
                "No such graph",
                Some(id),
            ))
        }
    }
}

fn with_index(
    index: Arc<ArtifactIndex>,
) -> impl Filter<Extract = (Arc<ArtifactIndex>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&index))
}

/// `GET /`, `/health`, `/graphs` and `/graphs/<id>` (where `current` is the
/// newest artifact) over the artifacts in `index`.
pub fn routes(
    index: ArtifactIndex,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = Arc::new(index);

    let landing = warp::path::end()
        .and(warp::get())
        .map(|| "pagereport: page and post analytics under /graphs\n");

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let list = warp::path("graphs")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_index(Arc::clone(&index)))
        .and_then(list_graphs);

    let graph = warp::path!("graphs" / String)
        .and(warp::get())
        .and(with_index(index))
        .and_then(serve_graph);

    landing
        .or(health)
        .or(list)
        .or(graph)
        .with(warp::trace::request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{artifact_name, ArtifactWriter, FsArtifactWriter};
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn serves_listed_and_current_graphs() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let writer = FsArtifactWriter::new(tmp.path());
        writer.write(&artifact_name("9", "page"), "<p>page</p>")?;
        thread::sleep(Duration::from_millis(50));
        writer.write(&artifact_name("9", "post"), "<p>posts</p>")?;
        let api = routes(ArtifactIndex::new(tmp.path()));

        let res = warp::test::request().path("/graphs").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let listed: serde_json::Value = serde_json::from_slice(res.body())?;
        assert_eq!(listed[0]["id"], "9_post_analytics");
        assert_eq!(listed.as_array().map(Vec::len), Some(2));

        let res = warp::test::request().path("/graphs/current").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"<p>posts</p>");

        let res = warp::test::request()
            .path("/graphs/9_page_analytics")
            .reply(&api)
            .await;
        assert_eq!(res.body().as_ref(), b"<p>page</p>");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_graph_is_not_found() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let api = routes(ArtifactIndex::new(tmp.path()));

        let res = warp::test::request().path("/graphs/nope").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = warp::test::request().path("/graphs/current").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request().path("/").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }
}
