//! Credential payload validation, one JSON schema per delivery type.

use crate::error::{Error, Result};
use crate::model::{DeliveryType, StockClaim};
use jsonschema::validate;
use once_cell::sync::Lazy;
use serde_json::{Value, json};

static CREDENTIALS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["email", "password"],
        "properties": {
            "email": { "type": "string", "minLength": 3 },
            "password": { "type": "string", "minLength": 1 },
            "profile": { "type": "string" },
            "note": { "type": "string" }
        }
    })
});

static COUPON_CODE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["code"],
        "properties": {
            "code": { "type": "string", "minLength": 1 },
            "note": { "type": "string" }
        }
    })
});

static INSTANT_KEY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["key"],
        "properties": {
            "key": { "type": "string", "minLength": 1 },
            "note": { "type": "string" }
        }
    })
});

static MANUAL_ACTIVATION_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "note": { "type": "string" }
        }
    })
});

fn schema_for(delivery_type: DeliveryType) -> &'static Value {
    match delivery_type {
        DeliveryType::Credentials => &CREDENTIALS_SCHEMA,
        DeliveryType::CouponCode => &COUPON_CODE_SCHEMA,
        DeliveryType::InstantKey => &INSTANT_KEY_SCHEMA,
        DeliveryType::ManualActivation => &MANUAL_ACTIVATION_SCHEMA,
    }
}

/// Validate an admin-supplied credentials payload against the delivery
/// type's schema.
pub fn validate_credentials(delivery_type: DeliveryType, payload: &Value) -> Result<()> {
    if let Err(error) = validate(schema_for(delivery_type), payload) {
        return Err(Error::validation(format!(
            "credentials payload rejected: {error}"
        )));
    }
    Ok(())
}

/// Resolve the credentials attached to a completed order: an explicit admin
/// payload wins (validated), otherwise the claimed stock key's payload.
/// Only manual activation may complete without credentials.
pub fn resolve_credentials(
    delivery_type: DeliveryType,
    admin_payload: Option<Value>,
    claim: &StockClaim,
) -> Result<Value> {
    if let Some(payload) = admin_payload {
        validate_credentials(delivery_type, &payload)?;
        return Ok(payload);
    }
    match claim {
        StockClaim::Key(assignment) => Ok(json!({ "key": assignment.payload })),
        StockClaim::Decremented | StockClaim::NotRequired => {
            if delivery_type == DeliveryType::ManualActivation {
                Ok(Value::Null)
            } else {
                Err(Error::validation(
                    "credentials payload required for this delivery type",
                ))
            }
        }
    }
}
