use std::sync::Arc;

use axum::{extract::Query, response::Html, Extension};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    bucket::{BucketApi, UploadPolicy},
    middleware::{AccessToken, UserScope},
    types::{AppError, Environment},
};

const UPLOAD_PAGE: &str = "upload_page";

/// Renders the upload form
pub struct UploadPage {
    engine: Handlebars<'static>,
}

#[derive(Serialize)]
struct UploadPageData<'a> {
    post_fields: &'a UploadPolicy,
    prefix: &'a str,
    access_token: &'a str,
}

impl UploadPage {
    /// Compiles the embedded template
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not parse
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut engine = Handlebars::new();
        engine.set_strict_mode(true);
        engine.register_template_string(UPLOAD_PAGE, include_str!("../../templates/index.hbs"))?;

        Ok(Self { engine })
    }

    /// Renders the form for `policy`
    ///
    /// `access_token` is sent back as a bearer token by the page's own API
    /// calls. Pass an empty string when auth is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails
    pub fn render(
        &self,
        policy: &UploadPolicy,
        prefix: &str,
        access_token: &str,
    ) -> Result<String, handlebars::RenderError> {
        self.engine.render(
            UPLOAD_PAGE,
            &UploadPageData {
                post_fields: policy,
                prefix,
                access_token,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// Pins the upload's `Content-Type`, e.g. `image/png`
    pub content_type: Option<String>,
}

/// Home page with a form that uploads straight to the bucket
///
/// The form carries a presigned POST policy scoped to the caller's prefix.
///
/// # Errors
///
/// - `BucketError` - the policy could not be signed
/// - `RenderError` - the page could not be rendered
#[instrument(skip_all, fields(prefix = %scope.prefix))]
pub async fn handler(
    Extension(bucket): Extension<Arc<dyn BucketApi>>,
    Extension(page): Extension<Arc<UploadPage>>,
    Extension(environment): Extension<Environment>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    scope: UserScope,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, AppError> {
    let content_type = query
        .content_type
        .as_deref()
        .filter(|content_type| !content_type.is_empty());

    let policy = bucket
        .presigned_upload_policy(
            content_type,
            &scope.prefix,
            environment.presigned_url_expiry(),
        )
        .await?;

    Ok(Html(page.render(
        &policy,
        &scope.prefix,
        token.as_deref().unwrap_or_default(),
    )?))
}
