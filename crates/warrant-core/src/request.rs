//! Wire envelopes accepted by the orchestrator.
//!
//! Three stable request shapes: the human-initiation attestation, the
//! browser action request with its closed allow/deny action lists, and
//! the platform submission request. Validation happens at construction;
//! downstream code only ever sees the sealed forms.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::crypto::{Hash, hash_hex};

/// Errors from envelope validation.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request's action is outside the allowlist.
    ///
    /// Integrity-class: hard stop, always audited.
    #[error("forbidden action: {detail}")]
    ForbiddenAction {
        /// Why the action was refused.
        detail: String,
    },

    /// The envelope did not attest explicit human initiation.
    #[error("human initiation required: {detail}")]
    HumanInitiationRequired {
        /// What was wrong with the attestation.
        detail: String,
    },
}

fn deserialize_literal_true<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    let value = bool::deserialize(de)?;
    if value {
        Ok(true)
    } else {
        Err(serde::de::Error::custom(
            "human_initiated must be literally true",
        ))
    }
}

/// Attestation that a human performed an explicit UI gesture.
///
/// `human_initiated` must be literally `true`; deserializing any other
/// value fails. The element id names the control the human activated
/// and the timestamp is the gesture time in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HumanInitiation {
    /// Always `true`; enforced at the deserializer.
    #[serde(deserialize_with = "deserialize_literal_true")]
    pub human_initiated: bool,
    /// Gesture time, Unix milliseconds.
    pub timestamp_millis: i64,
    /// The UI element the human activated.
    pub element_id: String,
}

impl HumanInitiation {
    /// Builds an attestation for a gesture on `element_id`.
    #[must_use]
    pub fn new(element_id: &str, timestamp_millis: i64) -> Self {
        Self {
            human_initiated: true,
            timestamp_millis,
            element_id: element_id.to_string(),
        }
    }

    /// Re-checks the attestation (construction paths other than serde).
    ///
    /// # Errors
    ///
    /// [`RequestError::HumanInitiationRequired`] when the flag is not
    /// `true` or the element id is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if !self.human_initiated {
            return Err(RequestError::HumanInitiationRequired {
                detail: "human_initiated is not true".to_string(),
            });
        }
        if self.element_id.trim().is_empty() {
            return Err(RequestError::HumanInitiationRequired {
                detail: "element_id is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// The closed allowlist of browser actions the core will gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ActionKind {
    /// Navigate to a URL.
    Navigate,
    /// Click an element.
    Click,
    /// Type text into an element.
    InputText,
    /// Scroll the page.
    Scroll,
    /// Wait for a condition or duration.
    Wait,
    /// Capture a screenshot.
    Screenshot,
    /// Read element text.
    GetText,
    /// Read an element attribute.
    GetAttribute,
    /// Hover an element.
    Hover,
    /// Choose a select option.
    SelectOption,
}

impl ActionKind {
    /// Returns the wire name of this action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "NAVIGATE",
            Self::Click => "CLICK",
            Self::InputText => "INPUT_TEXT",
            Self::Scroll => "SCROLL",
            Self::Wait => "WAIT",
            Self::Screenshot => "SCREENSHOT",
            Self::GetText => "GET_TEXT",
            Self::GetAttribute => "GET_ATTRIBUTE",
            Self::Hover => "HOVER",
            Self::SelectOption => "SELECT_OPTION",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "NAVIGATE" => Some(Self::Navigate),
            "CLICK" => Some(Self::Click),
            "INPUT_TEXT" => Some(Self::InputText),
            "SCROLL" => Some(Self::Scroll),
            "WAIT" => Some(Self::Wait),
            "SCREENSHOT" => Some(Self::Screenshot),
            "GET_TEXT" => Some(Self::GetText),
            "GET_ATTRIBUTE" => Some(Self::GetAttribute),
            "HOVER" => Some(Self::Hover),
            "SELECT_OPTION" => Some(Self::SelectOption),
            _ => None,
        }
    }
}

/// Actions the core refuses outright. Kept as an explicit enumeration
/// so refusals can name what was matched; anything outside the
/// allowlist is rejected even when it matches none of these.
const FORBIDDEN_ACTIONS: &[&str] = &[
    "LOGIN",
    "AUTHENTICATE",
    "CREATE_ACCOUNT",
    "DELETE_ACCOUNT",
    "MODIFY_DATA",
    "DELETE_DATA",
    "SUBMIT_FORM",
    "UPLOAD_FILE",
    "DOWNLOAD_FILE",
    "EXECUTE_SCRIPT",
    "BYPASS_CAPTCHA",
    "BYPASS_AUTH",
    "IMPERSONATE",
    "ACCESS_ADMIN",
    "PAYMENT",
    "CHECKOUT",
];

/// Parameter keywords that mark an attempt to drive a forbidden flow
/// through an allowed action kind.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "password", "passwd", "secret", "api_key", "apikey", "captcha", "recaptcha", "hcaptcha",
    "credit_card", "creditcard", "cvv", "ssn",
];

/// Target path fragments that always refuse: authentication, admin, and
/// payment surfaces.
const FORBIDDEN_TARGET_PATHS: &[&str] = &[
    "/login",
    "/signin",
    "/signup",
    "/register",
    "/auth",
    "/admin",
    "/wp-admin",
    "/administrator",
    "/checkout",
    "/payment",
    "/pay",
];

/// A raw, untrusted action request as received on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Requested action name; validated against the allowlist.
    pub action_type: String,
    /// CSS selector or URL the action targets.
    pub target: String,
    /// Action parameters, ordered for canonical encoding.
    pub parameters: BTreeMap<String, String>,
}

/// A validated action: the only form the executor seam accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeAction {
    /// The allowlisted kind.
    pub kind: ActionKind,
    /// Validated target.
    pub target: String,
    /// Screened parameters.
    pub parameters: BTreeMap<String, String>,
}

impl SafeAction {
    /// Validates a raw request into a safe action.
    ///
    /// Checks, in order: the deny list (named refusal), the allowlist
    /// (anything else refuses too), forbidden keywords in parameters,
    /// and forbidden target paths.
    ///
    /// # Errors
    ///
    /// [`RequestError::ForbiddenAction`] naming the first failed check.
    pub fn from_request(request: &ActionRequest) -> Result<Self, RequestError> {
        let name = request.action_type.trim().to_uppercase();

        if FORBIDDEN_ACTIONS.contains(&name.as_str()) {
            return Err(RequestError::ForbiddenAction {
                detail: format!("action {name} is on the deny list"),
            });
        }

        let Some(kind) = ActionKind::parse(&name) else {
            return Err(RequestError::ForbiddenAction {
                detail: format!("action {name} is not on the allowlist"),
            });
        };

        for (key, value) in &request.parameters {
            let key_lower = key.to_ascii_lowercase();
            let value_lower = value.to_ascii_lowercase();
            for keyword in FORBIDDEN_KEYWORDS {
                if key_lower.contains(keyword) || value_lower.contains(keyword) {
                    return Err(RequestError::ForbiddenAction {
                        detail: format!("parameter {key:?} matches forbidden keyword {keyword:?}"),
                    });
                }
            }
        }

        let target_lower = request.target.to_ascii_lowercase();
        for fragment in FORBIDDEN_TARGET_PATHS {
            if target_lower.contains(fragment) {
                return Err(RequestError::ForbiddenAction {
                    detail: format!("target contains forbidden path {fragment:?}"),
                });
            }
        }

        Ok(Self {
            kind,
            target: request.target.clone(),
            parameters: request.parameters.clone(),
        })
    }
}

/// A request to transmit a confirmed draft to a platform.
///
/// The whole request — override flag included — is what a confirmation
/// token binds, so a duplicate override is itself human-authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// The human decision this submission realizes.
    pub decision_id: String,
    /// Destination platform tag.
    pub platform_tag: String,
    /// SHA-256 of the confirmed draft content.
    #[serde(with = "hash_hex")]
    pub draft_content_hash: Hash,
    /// Explicit, human-authorized duplicate override.
    #[serde(default)]
    pub override_duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: &str, target: &str) -> ActionRequest {
        ActionRequest {
            action_type: action.to_string(),
            target: target.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn allowlisted_actions_validate() {
        for name in [
            "NAVIGATE",
            "CLICK",
            "INPUT_TEXT",
            "SCROLL",
            "WAIT",
            "SCREENSHOT",
            "GET_TEXT",
            "GET_ATTRIBUTE",
            "HOVER",
            "SELECT_OPTION",
        ] {
            SafeAction::from_request(&request(name, "https://example.org/page")).unwrap();
        }
    }

    #[test]
    fn deny_listed_actions_are_named() {
        let err = SafeAction::from_request(&request("LOGIN", "https://example.org")).unwrap_err();
        assert!(err.to_string().contains("deny list"));
        for name in ["EXECUTE_SCRIPT", "BYPASS_CAPTCHA", "PAYMENT", "UPLOAD_FILE"] {
            assert!(SafeAction::from_request(&request(name, "x")).is_err());
        }
    }

    #[test]
    fn unknown_actions_are_rejected_too() {
        let err =
            SafeAction::from_request(&request("TELEPORT", "https://example.org")).unwrap_err();
        assert!(err.to_string().contains("not on the allowlist"));
    }

    #[test]
    fn forbidden_keywords_in_parameters_refuse() {
        let mut req = request("INPUT_TEXT", "https://example.org/form");
        req.parameters
            .insert("field".to_string(), "user_password_box".to_string());
        assert!(SafeAction::from_request(&req).is_err());
    }

    #[test]
    fn auth_and_payment_targets_refuse() {
        for target in [
            "https://example.org/login",
            "https://example.org/wp-admin/options",
            "https://shop.example/checkout/step-1",
        ] {
            assert!(SafeAction::from_request(&request("NAVIGATE", target)).is_err());
        }
    }

    #[test]
    fn human_initiation_must_be_literally_true() {
        let ok: HumanInitiation = serde_json::from_str(
            r#"{"human_initiated": true, "timestamp_millis": 1767225600000, "element_id": "submit-btn"}"#,
        )
        .unwrap();
        ok.validate().unwrap();

        let rejected = serde_json::from_str::<HumanInitiation>(
            r#"{"human_initiated": false, "timestamp_millis": 1, "element_id": "x"}"#,
        );
        assert!(rejected.is_err());

        let not_bool = serde_json::from_str::<HumanInitiation>(
            r#"{"human_initiated": "yes", "timestamp_millis": 1, "element_id": "x"}"#,
        );
        assert!(not_bool.is_err());
    }

    #[test]
    fn submission_request_round_trips_with_default_override() {
        let json = format!(
            r#"{{"decision_id": "d-1", "platform_tag": "hackerone", "draft_content_hash": "{}"}}"#,
            hex::encode(crate::crypto::sha256(b"draft"))
        );
        let req: SubmissionRequest = serde_json::from_str(&json).unwrap();
        assert!(!req.override_duplicate);
    }
}
