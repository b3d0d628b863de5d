//! Request and response payloads of the backend REST contract.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use secure_store_core::{
    CartItem, OrderId, Price, Product, ProductId, Role, UserId, UserIdentity,
};

/// Username and password for `login` and `register`.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: SecretString,
}

impl Credentials {
    /// Bundle a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// JSON body `{username, password}`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!({
            "username": self.username,
            "password": self.password.expose_secret(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response of `POST <auth>/login`.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// User ID (sent as `id` or `user_id`).
    #[serde(alias = "user_id")]
    pub id: UserId,
    /// Account name.
    pub username: String,
    /// Granted role.
    #[serde(default)]
    pub role: Role,
}

impl LoginResponse {
    /// The identity carried by the response.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(self.id.clone(), self.username.clone(), self.role)
    }
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish()
    }
}

/// Response of `GET <profile>`.
///
/// Some backends omit the username; the cached one is kept in that case.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    /// User ID.
    pub id: UserId,
    /// Account name, if the backend includes it.
    #[serde(default)]
    pub username: Option<String>,
    /// Granted role.
    #[serde(default)]
    pub role: Role,
}

/// Response of `POST <auth>/refresh`.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    /// Replacement bearer token.
    pub token: String,
}

/// A product as listed by `GET <products>`.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProduct {
    /// Product identity.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Price,
    /// Whether the product can currently be bought.
    #[serde(default = "default_available")]
    pub available: bool,
    /// Optional image URL.
    #[serde(default)]
    pub image: Option<String>,
}

const fn default_available() -> bool {
    true
}

impl From<CatalogProduct> for Product {
    fn from(product: CatalogProduct) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            image: product.image,
        }
    }
}

/// Shipping details collected by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub email: String,
}

/// A cart line as sent to the checkout endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutItem {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&CartItem> for CheckoutItem {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            price: item.price.amount(),
            quantity: item.quantity,
            image: item.image.clone(),
        }
    }
}

/// Body of `POST <checkout>`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub shipping_info: ShippingInfo,
    pub user_id: Option<UserId>,
}

/// Response of `POST <checkout>`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    /// Whether the order was created.
    pub success: bool,
    /// Created order, on success.
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// Failure reason.
    #[serde(default)]
    pub error: Option<String>,
    /// Informational message.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_accepts_user_id_alias() {
        let with_id: LoginResponse =
            serde_json::from_str(r#"{"token":"t","id":"u1","username":"ann","role":"admin"}"#)
                .unwrap();
        let with_user_id: LoginResponse =
            serde_json::from_str(r#"{"token":"t","user_id":"u1","username":"ann","role":"user"}"#)
                .unwrap();

        assert_eq!(with_id.id, with_user_id.id);
        assert!(with_id.identity().is_admin());
        assert!(!with_user_id.identity().is_admin());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("ann", "hunter2-very-secret");
        let debug_output = format!("{credentials:?}");
        assert!(debug_output.contains("ann"));
        assert!(!debug_output.contains("hunter2-very-secret"));
        assert_eq!(credentials.to_body()["password"], "hunter2-very-secret");
    }

    #[test]
    fn test_checkout_item_sends_price_as_number() {
        let item = CheckoutItem {
            id: ProductId::new("p1"),
            name: "Widget".to_string(),
            price: Decimal::new(1999, 2),
            quantity: 2,
            image: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["price"], serde_json::json!(19.99));
        assert!(value.get("image").is_none());
    }

    #[test]
    fn test_profile_without_username() {
        let profile: ProfileResponse =
            serde_json::from_str(r#"{"id":"u1","role":"admin"}"#).unwrap();
        assert!(profile.username.is_none());
        assert_eq!(profile.role, Role::Admin);
    }
}
