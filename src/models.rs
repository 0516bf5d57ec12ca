//! Wire models and input validation for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Camp, Speaker};

/// Login/token request body. The password exists only for the duration of the
/// request and is never persisted or logged.
#[derive(Debug, Deserialize)]
pub struct CredentialModel {
    pub username: String,
    pub password: String,
}

impl CredentialModel {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username is required".into());
        }
        if self.password.is_empty() {
            return Err("password is required".into());
        }
        Ok(())
    }
}

/// Camp create/update body. The moniker is taken from the body on create and
/// from the path on update.
#[derive(Debug, Clone, Deserialize)]
pub struct CampModel {
    pub moniker: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_address1: Option<String>,
    #[serde(default)]
    pub location_city_town: Option<String>,
    #[serde(default)]
    pub location_state_province: Option<String>,
    #[serde(default)]
    pub location_postal_code: Option<String>,
    #[serde(default)]
    pub location_country: Option<String>,
}

impl CampModel {
    pub fn validate(&self) -> Result<(), String> {
        let moniker = self.moniker.trim();
        if moniker.len() < 3 || moniker.len() > 20 {
            return Err("moniker must be 3-20 characters".into());
        }
        if self.name.len() < 5 || self.name.len() > 100 {
            return Err("name must be 5-100 characters".into());
        }
        if self.description.len() < 25 || self.description.len() > 4095 {
            return Err("description must be 25-4095 characters".into());
        }
        Ok(())
    }

    pub fn into_camp(self) -> Camp {
        Camp {
            moniker: self.moniker.trim().to_string(),
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            location_address1: self.location_address1,
            location_city_town: self.location_city_town,
            location_state_province: self.location_state_province,
            location_postal_code: self.location_postal_code,
            location_country: self.location_country,
        }
    }
}

/// Speaker create/update body and response shape. The record's owner is
/// derived from the authenticated identity, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub head_shot_url: Option<String>,
}

impl SpeakerModel {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("speaker name is required".into());
        }
        Ok(())
    }

    /// Copy the mutable fields onto an existing record, leaving id, camp and
    /// owner untouched.
    pub fn apply_to(&self, speaker: &mut Speaker) {
        speaker.name = self.name.clone();
        speaker.company_name = self.company_name.clone();
        speaker.phone_number = self.phone_number.clone();
        speaker.website_url = self.website_url.clone();
        speaker.bio = self.bio.clone();
        speaker.head_shot_url = self.head_shot_url.clone();
    }
}

impl From<&Speaker> for SpeakerModel {
    fn from(s: &Speaker) -> Self {
        SpeakerModel {
            id: Some(s.id),
            name: s.name.clone(),
            company_name: s.company_name.clone(),
            phone_number: s.phone_number.clone(),
            website_url: s.website_url.clone(),
            bio: s.bio.clone(),
            head_shot_url: s.head_shot_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_camp() -> CampModel {
        CampModel {
            moniker: "atl2026".into(),
            name: "Atlanta Code Camp".into(),
            description: "A community conference with sessions across the stack.".into(),
            start_date: None,
            end_date: None,
            location_address1: None,
            location_city_town: None,
            location_state_province: None,
            location_postal_code: None,
            location_country: None,
        }
    }

    #[test]
    fn camp_bounds_are_enforced() {
        assert!(valid_camp().validate().is_ok());

        let mut short_moniker = valid_camp();
        short_moniker.moniker = "ab".into();
        assert!(short_moniker.validate().is_err());

        let mut short_name = valid_camp();
        short_name.name = "camp".into();
        assert!(short_name.validate().is_err());

        let mut short_desc = valid_camp();
        short_desc.description = "too short".into();
        assert!(short_desc.validate().is_err());
    }

    #[test]
    fn credentials_require_both_fields() {
        let ok = CredentialModel { username: "alice".into(), password: "pw".into() };
        assert!(ok.validate().is_ok());
        let no_user = CredentialModel { username: "  ".into(), password: "pw".into() };
        assert!(no_user.validate().is_err());
        let no_pass = CredentialModel { username: "alice".into(), password: String::new() };
        assert!(no_pass.validate().is_err());
    }

    #[test]
    fn speaker_model_never_carries_the_owner() {
        let sp = Speaker {
            id: 7,
            camp_moniker: "atl2026".into(),
            owner: "alice".into(),
            name: "Alice".into(),
            company_name: None,
            phone_number: None,
            website_url: None,
            bio: None,
            head_shot_url: None,
        };
        let model = SpeakerModel::from(&sp);
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json.get("id").and_then(|v| v.as_i64()), Some(7));
        assert!(json.get("owner").is_none());
    }
}
