use super::handlers::{auth, health, root};
use utoipa::{
    openapi::{Contact, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        root::root,
        auth::login::login,
        auth::login::login_status,
    ),
    components(schemas(
        health::Health,
        root::Dashboard,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::LoginStatusResponse,
        auth::types::ErrorResponse,
    )),
    tags(
        (name = "pingate", description = "Protected dashboard"),
        (name = "auth", description = "PIN setup and login"),
        (name = "health", description = "Liveness of the service and its credential store")
    )
)]
struct ApiDoc;

/// The `OpenAPI` document for every routed endpoint except the static login page.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();
    doc
}

fn cargo_info() -> utoipa::openapi::Info {
    // Use Cargo.toml metadata instead of the utoipa defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => {
            let name = name.trim();
            let email = email.trim_end_matches('>').trim();
            (
                (!name.is_empty()).then_some(name),
                (!email.is_empty()).then_some(email),
            )
        }
        None => {
            let name = author.trim();
            ((!name.is_empty()).then_some(name), None)
        }
    }
}
