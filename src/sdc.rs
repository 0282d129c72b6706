//! Structured data (SDC) support for file pages.
//!
//! Converts the compact statement format carried in the generated info JSON
//! into a wikibase entity payload and writes it to the mediainfo entity of a
//! freshly uploaded file.

use crate::api::{ApiError, WikiClient};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

const DEFAULT_EDIT_SUMMARY: &str = "upload SDC data corresponding to recent upload";
const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";
const WIKIDATA_ENTITY_URI: &str = "http://www.wikidata.org/entity/";

/// Errors from building or writing structured data.
#[derive(Debug, Error)]
pub enum SdcError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no file page found for {0}")]
    MissingFilePage(String),

    #[error("cannot interpret statement value: {0}")]
    BadValue(String),
}

/// How the structured data write ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SdcOutcome {
    Written,
    /// The file already carried structured data, nothing was written
    PreExisting,
}

/// Whether a key names a wikibase property, e.g. "P170".
pub fn is_prop_key(key: &str) -> bool {
    key.len() > 1
        && key.starts_with('P')
        && key[1..].chars().all(|c| c.is_ascii_digit())
}

fn is_item_id(value: &str) -> bool {
    value.len() > 1
        && value.starts_with('Q')
        && value[1..].chars().all(|c| c.is_ascii_digit())
}

/// Write structured data to the mediainfo entity of a file page.
///
/// Files that already carry structured data are left untouched so a rerun
/// cannot clobber statements added by others.
pub async fn upload_sdc(
    client: &mut WikiClient,
    file_title: &str,
    sdc_data: &Value,
) -> Result<SdcOutcome, SdcError> {
    let page_id = client
        .page_id(file_title)
        .await?
        .ok_or_else(|| SdcError::MissingFilePage(file_title.to_string()))?;
    let mid = format!("M{}", page_id);

    let entity = client.wb_get_entity(&mid).await?;
    if entity.get("pageid").is_some() {
        warn!("{}: skipped due to pre-existing sdc-data", file_title);
        return Ok(SdcOutcome::PreExisting);
    }

    let summary = sdc_data
        .get("edit_summary")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_EDIT_SUMMARY)
        .to_string();
    let payload = build_entity_data(sdc_data)?;
    client.wb_edit_entity(&mid, &payload, &summary).await?;
    Ok(SdcOutcome::Written)
}

/// Build a wbeditentity payload from the compact statement format.
///
/// The input object may hold a "caption" object of language to text, an
/// "edit_summary" (handled by the caller) and any number of property keys.
/// A property value is a bare value, a list of values, or an object with the
/// main value under "_", an optional "prominent" flag and nested property
/// keys as qualifiers.
pub fn build_entity_data(sdc_data: &Value) -> Result<Value, SdcError> {
    let obj = sdc_data
        .as_object()
        .ok_or_else(|| SdcError::BadValue(sdc_data.to_string()))?;
    let mut entity = Map::new();

    if let Some(captions) = obj.get("caption").and_then(Value::as_object) {
        let mut labels = Map::new();
        for (lang, text) in captions {
            let text = text
                .as_str()
                .ok_or_else(|| SdcError::BadValue(text.to_string()))?;
            labels.insert(
                lang.clone(),
                json!({"language": lang, "value": text}),
            );
        }
        entity.insert("labels".to_string(), Value::Object(labels));
    }

    let mut claims = Vec::new();
    for (key, value) in obj {
        if !is_prop_key(key) {
            continue;
        }
        match value {
            Value::Array(values) => {
                for value in values {
                    claims.push(build_claim(key, value)?);
                }
            }
            value => claims.push(build_claim(key, value)?),
        }
    }
    if !claims.is_empty() {
        entity.insert("claims".to_string(), Value::Array(claims));
    }

    Ok(Value::Object(entity))
}

fn build_claim(property: &str, value: &Value) -> Result<Value, SdcError> {
    let mut main_value = value;
    let mut rank = "normal";
    let mut qualifiers = Map::new();

    if let Some(obj) = value.as_object() {
        if let Some(main) = obj.get("_") {
            main_value = main;
            if obj.get("prominent").and_then(Value::as_bool) == Some(true) {
                rank = "preferred";
            }
            for (key, qual_value) in obj {
                if !is_prop_key(key) {
                    continue;
                }
                let snaks = match qual_value {
                    Value::Array(values) => values
                        .iter()
                        .map(|v| build_snak(key, v))
                        .collect::<Result<Vec<_>, _>>()?,
                    value => vec![build_snak(key, value)?],
                };
                qualifiers.insert(key.clone(), Value::Array(snaks));
            }
        }
    }

    let mut claim = Map::new();
    claim.insert("mainsnak".to_string(), build_snak(property, main_value)?);
    claim.insert("type".to_string(), json!("statement"));
    claim.insert("rank".to_string(), json!(rank));
    if !qualifiers.is_empty() {
        claim.insert("qualifiers".to_string(), Value::Object(qualifiers));
    }
    Ok(Value::Object(claim))
}

fn build_snak(property: &str, value: &Value) -> Result<Value, SdcError> {
    let datavalue = build_datavalue(value)?;
    Ok(json!({
        "snaktype": "value",
        "property": property,
        "datavalue": datavalue,
    }))
}

/// Infer the wikibase datatype from the shape of the value.
fn build_datavalue(value: &Value) -> Result<Value, SdcError> {
    if let Some(s) = value.as_str() {
        if is_item_id(s) {
            let numeric_id: u64 = s[1..]
                .parse()
                .map_err(|_| SdcError::BadValue(s.to_string()))?;
            return Ok(json!({
                "value": {"entity-type": "item", "numeric-id": numeric_id, "id": s},
                "type": "wikibase-entityid",
            }));
        }
        if let Some(time) = iso_to_wb_time(s) {
            return Ok(time);
        }
        return Ok(json!({"value": s, "type": "string"}));
    }

    if let Some(obj) = value.as_object() {
        if let (Some(text), Some(lang)) = (
            obj.get("text").and_then(Value::as_str),
            obj.get("lang").and_then(Value::as_str),
        ) {
            return Ok(json!({
                "value": {"text": text, "language": lang},
                "type": "monolingualtext",
            }));
        }
        if let (Some(lat), Some(lon)) = (
            obj.get("lat").and_then(Value::as_f64),
            obj.get("lon").and_then(Value::as_f64),
        ) {
            return Ok(json!({
                "value": {
                    "latitude": lat,
                    "longitude": lon,
                    "precision": 0.0001,
                    "globe": "http://www.wikidata.org/entity/Q2",
                },
                "type": "globecoordinate",
            }));
        }
        if let Some(amount) = obj.get("amount") {
            let amount = match amount {
                Value::String(s) if s.starts_with('+') || s.starts_with('-') => s.clone(),
                Value::String(s) => format!("+{}", s),
                Value::Number(n) if n.as_f64().map_or(false, |f| f < 0.0) => n.to_string(),
                Value::Number(n) => format!("+{}", n),
                other => return Err(SdcError::BadValue(other.to_string())),
            };
            let unit = match obj.get("unit").and_then(Value::as_str) {
                Some(unit) if is_item_id(unit) => {
                    format!("{}{}", WIKIDATA_ENTITY_URI, unit)
                }
                Some(unit) => unit.to_string(),
                None => "1".to_string(),
            };
            return Ok(json!({
                "value": {"amount": amount, "unit": unit},
                "type": "quantity",
            }));
        }
    }

    Err(SdcError::BadValue(value.to_string()))
}

/// An ISO date (year, year-month or full date) as a wikibase time value.
///
/// Precision is 9 for a bare year, 10 with a month and 11 with a day.
pub fn iso_to_wb_time(date: &str) -> Option<Value> {
    let parts: Vec<&str> = date.split('-').collect();
    if parts.is_empty() || parts.len() > 3 || parts[0].len() != 4 {
        return None;
    }
    let year: u32 = parts[0].parse().ok()?;
    let month: u32 = match parts.get(1) {
        Some(m) if m.len() == 2 => {
            let m = m.parse().ok()?;
            if !(1..=12).contains(&m) {
                return None;
            }
            m
        }
        Some(_) => return None,
        None => 0,
    };
    let day: u32 = match parts.get(2) {
        Some(d) if d.len() == 2 => {
            let d = d.parse().ok()?;
            if !(1..=31).contains(&d) {
                return None;
            }
            d
        }
        Some(_) => return None,
        None => 0,
    };
    let precision = 9 + parts.len() - 1;
    Some(json!({
        "value": {
            "time": format!("+{:04}-{:02}-{:02}T00:00:00Z", year, month, day),
            "precision": precision,
            "timezone": 0,
            "before": 0,
            "after": 0,
            "calendarmodel": GREGORIAN_CALENDAR,
        },
        "type": "time",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- property keys ----

    #[test]
    fn prop_keys_recognised() {
        assert!(is_prop_key("P170"));
        assert!(is_prop_key("P1"));
        assert!(!is_prop_key("P"));
        assert!(!is_prop_key("Q170"));
        assert!(!is_prop_key("P17a"));
        assert!(!is_prop_key("caption"));
    }

    // ---- time values ----

    #[test]
    fn wb_time_precisions() {
        let year = iso_to_wb_time("1921").unwrap();
        assert_eq!(year.pointer("/value/time").unwrap(), "+1921-00-00T00:00:00Z");
        assert_eq!(year.pointer("/value/precision").unwrap(), 9);

        let month = iso_to_wb_time("1921-05").unwrap();
        assert_eq!(month.pointer("/value/time").unwrap(), "+1921-05-00T00:00:00Z");
        assert_eq!(month.pointer("/value/precision").unwrap(), 10);

        let day = iso_to_wb_time("1921-05-17").unwrap();
        assert_eq!(day.pointer("/value/time").unwrap(), "+1921-05-17T00:00:00Z");
        assert_eq!(day.pointer("/value/precision").unwrap(), 11);
    }

    #[test]
    fn wb_time_rejects_invalid_dates() {
        assert!(iso_to_wb_time("21").is_none());
        assert!(iso_to_wb_time("1921-13").is_none());
        assert!(iso_to_wb_time("1921-05-32").is_none());
        assert!(iso_to_wb_time("kanske 1921").is_none());
    }

    // ---- datavalues ----

    #[test]
    fn item_values_become_entity_ids() {
        let dv = build_datavalue(&serde_json::json!("Q42")).unwrap();
        assert_eq!(dv.pointer("/type").unwrap(), "wikibase-entityid");
        assert_eq!(dv.pointer("/value/numeric-id").unwrap(), 42);
    }

    #[test]
    fn plain_strings_stay_strings() {
        let dv = build_datavalue(&serde_json::json!("A ship")).unwrap();
        assert_eq!(dv.pointer("/type").unwrap(), "string");
        assert_eq!(dv.pointer("/value").unwrap(), "A ship");
    }

    #[test]
    fn monolingual_and_quantity_shapes() {
        let dv =
            build_datavalue(&serde_json::json!({"text": "Ett skepp", "lang": "sv"})).unwrap();
        assert_eq!(dv.pointer("/type").unwrap(), "monolingualtext");
        assert_eq!(dv.pointer("/value/language").unwrap(), "sv");

        let dv = build_datavalue(&serde_json::json!({"amount": 5, "unit": "Q11573"})).unwrap();
        assert_eq!(dv.pointer("/type").unwrap(), "quantity");
        assert_eq!(dv.pointer("/value/amount").unwrap(), "+5");
        assert_eq!(
            dv.pointer("/value/unit").unwrap(),
            "http://www.wikidata.org/entity/Q11573"
        );
    }

    #[test]
    fn coordinates_become_globecoordinates() {
        let dv =
            build_datavalue(&serde_json::json!({"lat": 59.3251, "lon": 18.0711})).unwrap();
        assert_eq!(dv.pointer("/type").unwrap(), "globecoordinate");
        assert_eq!(dv.pointer("/value/latitude").unwrap(), 59.3251);
    }

    // ---- full payloads ----

    #[test]
    fn entity_data_with_captions_and_claims() {
        let sdc = serde_json::json!({
            "caption": {"sv": "Ett skepp", "en": "A ship"},
            "edit_summary": "custom summary",
            "P170": {"_": "Q123", "prominent": true, "P2093": "Anna Andersson"},
            "P571": "1921-05-17",
            "P180": ["Q456", "Q789"],
        });
        let entity = build_entity_data(&sdc).unwrap();

        assert_eq!(entity.pointer("/labels/sv/value").unwrap(), "Ett skepp");
        assert_eq!(entity.pointer("/labels/en/language").unwrap(), "en");

        let claims = entity.pointer("/claims").unwrap().as_array().unwrap();
        // P170, P180 twice, P571
        assert_eq!(claims.len(), 4);

        let creator = claims
            .iter()
            .find(|c| c.pointer("/mainsnak/property").unwrap() == "P170")
            .unwrap();
        assert_eq!(creator.pointer("/rank").unwrap(), "preferred");
        assert_eq!(
            creator
                .pointer("/qualifiers/P2093/0/datavalue/value")
                .unwrap(),
            "Anna Andersson"
        );

        let date = claims
            .iter()
            .find(|c| c.pointer("/mainsnak/property").unwrap() == "P571")
            .unwrap();
        assert_eq!(
            date.pointer("/mainsnak/datavalue/type").unwrap(),
            "time"
        );
    }

    #[test]
    fn entity_data_without_statements_is_empty() {
        let entity = build_entity_data(&serde_json::json!({})).unwrap();
        assert_eq!(entity, serde_json::json!({}));
    }
}
