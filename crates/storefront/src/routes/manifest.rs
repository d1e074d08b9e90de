//! Web app manifest route handler.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Browser chrome colour, shared with the `theme-color` meta tag.
pub const THEME_COLOR: &str = "#0b1a3d";

/// Serve the web app manifest.
pub async fn webmanifest() -> Response {
    let manifest = serde_json::json!({
        "name": "Bloudan Jewellery Catalogue",
        "short_name": "Catalogue",
        "start_url": "/",
        "scope": "/",
        "display": "standalone",
        "theme_color": THEME_COLOR,
        "background_color": "#f3f4f6"
    });

    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        manifest.to_string(),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manifest_theme_color() {
        let response = webmanifest().await;
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/manifest+json"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(manifest["theme_color"], THEME_COLOR);
        assert_eq!(manifest["start_url"], "/");
    }
}
