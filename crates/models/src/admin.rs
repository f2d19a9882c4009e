use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /admin/login`. No `Debug`, it carries the password.
#[derive(Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
    /// The six-digit one-time code.
    #[serde(default)]
    pub token: String,
    #[serde(default, rename = "rememberDevice", deserialize_with = "checkbox")]
    pub remember_device: bool,
}

/// Body of `POST /admin/logout`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default, rename = "forgetDevice", deserialize_with = "checkbox")]
    pub forget_device: bool,
}

/// Response of `GET /admin/check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSessionStatus {
    #[serde(rename = "loggedIn")]
    pub logged_in: bool,
}

/// HTML checkboxes post `on`; JSON clients may post a real boolean.
fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "on" | "true" | "1" | "yes"
        ),
    })
}
