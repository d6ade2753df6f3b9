// server/src/web/handlers/product_handlers.rs

use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, HttpResponseBuilder};
use backoffice::coerce;
use backoffice::{resolve_expected_version, NewProduct, Product, ProductFilter, RawNewProduct, RawProductPatch, Version};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

// --- Precondition headers ---

/// Version pinned through an `If-Match` header. Absent header and `*` both mean "no expectation".
#[derive(Debug, Clone, Copy, Default)]
pub struct IfMatch(pub Option<Version>);

impl FromRequest for IfMatch {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    futures_util::future::ready(parse_if_match(req))
  }
}

fn parse_if_match(req: &HttpRequest) -> Result<IfMatch, AppError> {
  let Some(raw) = req.headers().get(header::IF_MATCH) else {
    return Ok(IfMatch(None));
  };
  let value = raw
    .to_str()
    .map_err(|_| AppError::Validation("If-Match header is not valid ASCII".to_string()))?;
  let version = Version::from_if_match(value).map_err(|e| {
    warn!(header = %value, "Rejecting malformed If-Match header.");
    AppError::from(e)
  })?;
  Ok(IfMatch(version))
}

/// True when an `If-None-Match` header names the product's current tag (weak comparison).
fn matches_if_none_match(req: &HttpRequest, product: &Product) -> bool {
  let Some(value) = req.headers().get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) else {
    return false;
  };
  value.split(',').map(str::trim).any(|tag| {
    tag == "*" || Version::from_etag(tag).map(|v| v == product.version).unwrap_or(false)
  })
}

fn product_response(mut builder: HttpResponseBuilder, message: &str, product: &Product) -> HttpResponse {
  builder.insert_header((header::ETAG, product.etag())).json(json!({
      "message": message,
      "product": product
  }))
}

// --- Request DTOs ---

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ListProductsQuery {
  pub include_inactive: bool,
  pub include_deleted: bool,
  pub search: Option<String>,
}

impl From<ListProductsQuery> for ProductFilter {
  fn from(query: ListProductsQuery) -> Self {
    ProductFilter {
      include_inactive: query.include_inactive,
      include_deleted: query.include_deleted,
      search: query.search,
    }
  }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct GetProductQuery {
  pub include_deleted: bool,
}

/// Body of `reserve` / `release`. Numbers may arrive as JSON numbers or numeric strings.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct StockMovementPayload {
  pub quantity: Value,
  #[serde(default)]
  pub expected_version: Option<Value>,
}

impl StockMovementPayload {
  fn into_parts(self) -> Result<(i32, Option<Version>), AppError> {
    let quantity = coerce::parse_quantity("quantity", &self.quantity)?;
    let expected_version = match self.expected_version {
      Some(value) => Some(coerce::parse_version("expected_version", &value)?),
      None => None,
    };
    Ok((quantity, expected_version))
  }
}

// --- Handler Implementations ---

#[instrument(name = "handler::list_products", skip(app_state, query))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListProductsQuery>,
) -> Result<HttpResponse, AppError> {
  let filter = ProductFilter::from(query.into_inner());
  let products = app_state.products.list(&filter).await?;
  info!("Fetched {} products.", products.len());

  Ok(HttpResponse::Ok().json(json!({
      "message": "Products fetched successfully.",
      "products": products
  })))
}

#[instrument(name = "handler::create_product", skip(app_state, payload))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<RawNewProduct>,
) -> Result<HttpResponse, AppError> {
  let new_product = NewProduct::try_from(payload.into_inner())?;
  let product = app_state.products.create(new_product).await?;
  info!(product_id = %product.id, "Product created via API.");

  let mut builder = HttpResponse::Created();
  builder.insert_header((header::LOCATION, format!("/api/v1/products/{}", product.id)));
  Ok(product_response(builder, "Product created successfully.", &product))
}

#[instrument(name = "handler::get_product", skip(app_state, req, path, query), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  path: web::Path<Uuid>,
  query: web::Query<GetProductQuery>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let product = app_state.products.get(product_id, query.include_deleted).await?;

  if matches_if_none_match(&req, &product) {
    return Ok(
      HttpResponse::NotModified()
        .insert_header((header::ETAG, product.etag()))
        .finish(),
    );
  }
  Ok(product_response(HttpResponse::Ok(), "Product fetched successfully.", &product))
}

#[instrument(
    name = "handler::update_product",
    skip(app_state, path, payload, if_match),
    fields(product_id = %path.as_ref(), if_match = ?if_match.0.map(Version::get))
)]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<RawProductPatch>,
  if_match: IfMatch,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let (patch, body_version) = payload.into_inner().into_parts()?;
  let expected_version = resolve_expected_version(body_version, if_match.0);

  let product = app_state
    .products
    .apply_update(product_id, patch, expected_version)
    .await?;
  Ok(product_response(HttpResponse::Ok(), "Product updated successfully.", &product))
}

#[instrument(name = "handler::delete_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.products.soft_delete(path.into_inner()).await?;
  Ok(product_response(HttpResponse::Ok(), "Product deleted successfully.", &product))
}

#[instrument(name = "handler::restore_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn restore_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.products.restore(path.into_inner()).await?;
  Ok(product_response(HttpResponse::Ok(), "Product restored successfully.", &product))
}

#[instrument(name = "handler::reserve_stock", skip(app_state, path, payload, if_match), fields(product_id = %path.as_ref()))]
pub async fn reserve_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<StockMovementPayload>,
  if_match: IfMatch,
) -> Result<HttpResponse, AppError> {
  let (quantity, body_version) = payload.into_inner().into_parts()?;
  let expected_version = resolve_expected_version(body_version, if_match.0);
  let product = app_state
    .products
    .reserve(path.into_inner(), quantity, expected_version)
    .await?;
  Ok(product_response(HttpResponse::Ok(), "Stock reserved successfully.", &product))
}

#[instrument(name = "handler::release_stock", skip(app_state, path, payload, if_match), fields(product_id = %path.as_ref()))]
pub async fn release_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<StockMovementPayload>,
  if_match: IfMatch,
) -> Result<HttpResponse, AppError> {
  let (quantity, body_version) = payload.into_inner().into_parts()?;
  let expected_version = resolve_expected_version(body_version, if_match.0);
  let product = app_state
    .products
    .release(path.into_inner(), quantity, expected_version)
    .await?;
  Ok(product_response(HttpResponse::Ok(), "Stock released successfully.", &product))
}
