//! Per-operation request validation.
//!
//! One pure function per API operation, each composing the shared sub-rules
//! below. Rules short-circuit: the first failing rule produces the
//! [`KaiwaError::InvalidParameter`] message and later rules are not evaluated.
//! Some rules normalize the bag in place (id lists become comma-joined
//! strings, booleans become the literal strings `"true"`/`"false"`), so the
//! facade must validate before serializing.

use crate::error::KaiwaError;
use crate::params::{ParamValue, ParameterBag};

/// Accepted task status values.
pub const TASK_STATUSES: &[&str] = &["open", "done"];

/// Accepted room icon presets.
pub const ICON_PRESETS: &[&str] = &[
    "group", "check", "document", "meeting", "event", "project", "business", "study", "security",
    "star", "idea", "heart", "magcup", "beer", "music", "sports", "travel",
];

type Checked = Result<(), KaiwaError>;

fn fail(message: impl Into<String>) -> Checked {
    Err(KaiwaError::InvalidParameter(message.into()))
}

/// Value is composed entirely of ASCII digits (after string coercion).
fn is_digits(value: &ParamValue) -> bool {
    let s = value.render();
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Lenient comma-separated-ids check, kept compatible with the historical
/// behavior: a string passes if its *first* character is a digit or a comma.
/// Trailing garbage after that is not rejected. See
/// [`is_strict_comma_list`] for the tightened variant and DESIGN.md for why
/// the lenient form is the default.
fn is_comma_list(value: Option<&ParamValue>) -> bool {
    match value {
        None => true,
        Some(v) if v.is_empty() => true,
        Some(ParamValue::List(items)) => items
            .iter()
            .all(|item| is_digits(&ParamValue::Str(item.trim().to_string()))),
        Some(v) => v
            .render()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == ','),
    }
}

/// Strict variant: the whole string must consist of digits and commas.
///
/// Not wired into the operation rules; exposed for callers who want the
/// tightened behavior ahead of sending.
pub fn is_strict_comma_list(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit() || c == ',')
}

/// Rewrite a list value into its canonical comma-joined string form.
/// String values pass through unchanged.
fn normalize_comma_list(params: &mut ParameterBag, key: &str) {
    let joined = match params.get(key) {
        Some(ParamValue::List(items)) => items
            .iter()
            .map(|item| item.trim())
            .collect::<Vec<_>>()
            .join(","),
        _ => return,
    };
    params.set(key, joined);
}

/// Field must be present with a non-empty value.
fn check_required(params: &ParameterBag, key: &str) -> Checked {
    match params.get(key) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => fail(format!("{key} is required field.")),
    }
}

/// Field must be an all-digits id.
fn check_id(params: &ParameterBag, key: &str) -> Checked {
    match params.get(key) {
        Some(v) if is_digits(v) => Ok(()),
        _ => fail(format!("{key} must be integer.")),
    }
}

/// Optional field: if present, must parse as a non-zero integer.
fn check_optional_nonzero_id(params: &ParameterBag, key: &str) -> Checked {
    if let Some(v) = params.get(key) {
        let parsed = v.render().parse::<i64>().unwrap_or(0);
        if parsed == 0 {
            return fail(format!("{key} must be integer."));
        }
    }
    Ok(())
}

/// Optional field: if present, must be one of `allowed`.
fn check_optional_enum(params: &ParameterBag, key: &str, allowed: &[&str]) -> Checked {
    if let Some(v) = params.get(key) {
        let s = v.render();
        if !allowed.contains(&s.as_str()) {
            return fail(format!("Invalid {key} supplied: {s}"));
        }
    }
    Ok(())
}

/// Required comma-separated id list.
fn check_required_comma_list(params: &ParameterBag, key: &str) -> Checked {
    check_required(params, key)?;
    check_optional_comma_list(params, key)
}

/// Optional comma-separated id list; absent or empty passes.
fn check_optional_comma_list(params: &ParameterBag, key: &str) -> Checked {
    if is_comma_list(params.get(key)) {
        Ok(())
    } else {
        let shown = params.get(key).map(ParamValue::render).unwrap_or_default();
        fail(format!("Invalid {key} supplied: {shown}"))
    }
}

/// Optional boolean field, normalized to the literal strings the API expects.
fn check_optional_bool(params: &mut ParameterBag, key: &str) -> Checked {
    let flag = match params.get(key) {
        None => return Ok(()),
        Some(ParamValue::Bool(b)) => *b,
        Some(_) => return fail(format!("{key} must be boolean.")),
    };
    params.set(key, if flag { "true" } else { "false" });
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-operation rules
// ---------------------------------------------------------------------------

pub fn validate_my_tasks(params: &ParameterBag) -> Checked {
    check_optional_nonzero_id(params, "assigned_by_account_id")?;
    check_optional_enum(params, "status", TASK_STATUSES)
}

pub fn validate_create_room(params: &mut ParameterBag) -> Checked {
    check_required(params, "name")?;
    check_optional_enum(params, "icon_preset", ICON_PRESETS)?;
    check_required_comma_list(params, "members_admin_ids")?;
    check_optional_comma_list(params, "members_member_ids")?;
    check_optional_comma_list(params, "members_readonly_ids")?;

    normalize_comma_list(params, "members_admin_ids");
    normalize_comma_list(params, "members_member_ids");
    normalize_comma_list(params, "members_readonly_ids");
    Ok(())
}

pub fn validate_room_id(params: &ParameterBag) -> Checked {
    check_id(params, "room_id")
}

pub fn validate_update_room(params: &ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_optional_enum(params, "icon_preset", ICON_PRESETS)
}

pub fn validate_update_room_members(params: &mut ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_required_comma_list(params, "members_admin_ids")?;
    check_optional_comma_list(params, "members_member_ids")?;
    check_optional_comma_list(params, "members_readonly_ids")?;

    normalize_comma_list(params, "members_admin_ids");
    normalize_comma_list(params, "members_member_ids");
    normalize_comma_list(params, "members_readonly_ids");
    Ok(())
}

pub fn validate_post_room_message(params: &ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_required(params, "body")
}

pub fn validate_room_message_detail(params: &ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_required(params, "message_id")
}

pub fn validate_add_room_task(params: &mut ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_required(params, "body")?;
    if let Some(limit) = params.get("limit")
        && !is_digits(limit)
    {
        return fail("limit must be integer.");
    }
    check_required_comma_list(params, "to_ids")?;
    normalize_comma_list(params, "to_ids");
    Ok(())
}

pub fn validate_room_task_detail(params: &ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_id(params, "task_id")
}

pub fn validate_room_files(params: &ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_optional_nonzero_id(params, "account_id")
}

pub fn validate_room_file_detail(params: &mut ParameterBag) -> Checked {
    validate_room_id(params)?;
    check_optional_nonzero_id(params, "file_id")?;
    check_optional_bool(params, "create_download_url")
}
