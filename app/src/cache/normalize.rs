use serde_json::Value;

use crate::core::error::FetchError;
use crate::core::time::Date;

use super::quota::QuotaPlan;

//
// FORECASTS
//

/// Upstream occasionally reports spurious negative precipitation amounts.
/// Clamp them to zero before the document is persisted.
pub fn forecast(mut payload: Value) -> Result<Value, FetchError> {
    let Some(days) = payload.get_mut("dies").and_then(|d| d.as_array_mut()) else {
        return Err(FetchError::MalformedPayload("expected a document with a 'dies' list".to_owned()));
    };

    for day in days.iter_mut() {
        let Some(variables) = day.get_mut("variables").and_then(|v| v.as_object_mut()) else {
            continue;
        };
        if let Some(value) = variables.get_mut("precipitacio").and_then(|p| p.get_mut("valor"))
            && value.as_str().is_some_and(|v| v.starts_with('-'))
        {
            *value = Value::String("0.0".to_owned());
        }
    }

    Ok(payload)
}

/// Date of the first forecast day, used as the document's reference date.
pub fn forecast_reference_date(payload: &Value) -> Option<Date> {
    let first = payload.get("dies")?.as_array()?.first()?;
    let raw = first.get("data")?.as_str()?;
    Date::from_iso(raw.trim_end_matches('Z').get(..10)?).ok()
}

//
// UVI
//

pub fn uvi(payload: Value) -> Result<Value, FetchError> {
    if !payload.get("uvi").is_some_and(|u| u.is_array()) {
        return Err(FetchError::MalformedPayload("expected a document with a 'uvi' list".to_owned()));
    }
    Ok(payload)
}

//
// QUOTAS
//

const PLAN_ALIASES: [(&str, &str); 5] = [
    ("xdde_", "XDDE"),
    ("prediccio_", "Prediccio"),
    ("referencia basic", "Basic"),
    ("xema_", "XEMA"),
    ("quota", "Quota"),
];

/// Maps the upstream's varying plan labels onto the canonical names the rest
/// of the system keys on. Matching is accent-insensitive on a known prefix;
/// unrecognized labels pass through unchanged.
pub fn canonical_plan_name(raw: &str) -> String {
    let folded: String = raw.to_lowercase().chars().map(fold_accent).collect();
    PLAN_ALIASES
        .iter()
        .find(|(prefix, _)| folded.starts_with(prefix))
        .map(|(_, canonical)| (*canonical).to_owned())
        .unwrap_or_else(|| raw.to_owned())
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ä' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Canonicalizes plan names in a fresh quota document and books the call
/// that produced the document itself against the `Quota` plan, since the
/// returned counters predate it.
pub fn quotas(mut payload: Value) -> Result<Value, FetchError> {
    let Some(plans) = payload.get_mut("plans").and_then(|p| p.as_array_mut()) else {
        return Err(FetchError::MalformedPayload("expected a document with a 'plans' list".to_owned()));
    };

    for plan in plans.iter_mut() {
        let Some(raw_name) = plan.get("nom").and_then(|n| n.as_str()) else {
            return Err(FetchError::MalformedPayload("quota plan without a 'nom' field".to_owned()));
        };
        let canonical = canonical_plan_name(raw_name);

        if canonical == "Quota" {
            let made = plan.get("consultesRealitzades").and_then(|v| v.as_u64()).unwrap_or(0);
            let remaining = plan.get("consultesRestants").and_then(|v| v.as_u64()).unwrap_or(0);
            plan["consultesRealitzades"] = Value::from(made + 1);
            plan["consultesRestants"] = Value::from(remaining.saturating_sub(1));
        }

        plan["nom"] = Value::String(canonical);
    }

    Ok(payload)
}

/// Parses the plans of a normalized quota document into ledger entries.
pub fn quota_plans(payload: &Value) -> Vec<QuotaPlan> {
    let Some(plans) = payload.get("plans").and_then(|p| p.as_array()) else {
        return Vec::new();
    };

    plans
        .iter()
        .filter_map(|plan| {
            let max_calls = plan.get("maxConsultes")?.as_u64()? as u32;
            let calls_made = plan.get("consultesRealitzades")?.as_u64()? as u32;
            Some(QuotaPlan {
                name: plan.get("nom")?.as_str()?.to_owned(),
                period: plan.get("periode").and_then(|p| p.as_str()).unwrap_or_default().to_owned(),
                max_calls,
                calls_made,
                calls_remaining: max_calls.saturating_sub(calls_made),
            })
        })
        .collect()
}

#[cfg(test)]
mod shaping {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn plan_labels_fold_accents_and_match_prefixes() {
        assert_eq!(canonical_plan_name("XDDE_100"), "XDDE");
        assert_eq!(canonical_plan_name("Predicció_550"), "Prediccio");
        assert_eq!(canonical_plan_name("Referència Basic"), "Basic");
        assert_eq!(canonical_plan_name("xema_750"), "XEMA");
        assert_eq!(canonical_plan_name("Quota anual"), "Quota");
        assert_eq!(canonical_plan_name("Altres"), "Altres");
    }

    #[test]
    fn negative_precipitation_is_clamped() {
        let payload = json!({
            "dies": [
                {"data": "2025-01-15Z", "variables": {"precipitacio": {"valor": "-0.1"}}},
                {"data": "2025-01-16Z", "variables": {"precipitacio": {"valor": "2.4"}}},
            ]
        });

        let shaped = forecast(payload).unwrap();

        assert_json_eq!(
            shaped["dies"][0]["variables"]["precipitacio"]["valor"],
            json!("0.0")
        );
        assert_json_eq!(
            shaped["dies"][1]["variables"]["precipitacio"]["valor"],
            json!("2.4")
        );
    }

    #[test]
    fn forecast_without_days_is_malformed() {
        assert!(matches!(
            forecast(json!({"hores": []})),
            Err(FetchError::MalformedPayload(_))
        ));
    }

    #[test]
    fn reference_date_comes_from_the_first_day() {
        let payload = json!({"dies": [{"data": "2025-01-15T00:00:00Z"}, {"data": "2025-01-16T00:00:00Z"}]});
        assert_eq!(forecast_reference_date(&payload), Some(Date::from_iso("2025-01-15").unwrap()));
        assert_eq!(forecast_reference_date(&json!({"dies": []})), None);
    }

    #[test]
    fn quota_refresh_books_its_own_call() {
        let payload = json!({
            "client": {"nom": "test"},
            "plans": [
                {"nom": "Quota anual", "periode": "Anual", "maxConsultes": 300, "consultesRestants": 250, "consultesRealitzades": 50},
                {"nom": "Predicció_550", "periode": "Mensual", "maxConsultes": 550, "consultesRestants": 500, "consultesRealitzades": 50},
            ]
        });

        let shaped = quotas(payload).unwrap();

        assert_json_eq!(shaped["plans"][0]["nom"], json!("Quota"));
        assert_json_eq!(shaped["plans"][0]["consultesRealitzades"], json!(51));
        assert_json_eq!(shaped["plans"][0]["consultesRestants"], json!(249));
        assert_json_eq!(shaped["plans"][1]["nom"], json!("Prediccio"));
        assert_json_eq!(shaped["plans"][1]["consultesRealitzades"], json!(50));
    }

    #[test]
    fn ledger_entries_recompute_remaining() {
        let payload = json!({
            "plans": [
                {"nom": "XEMA", "periode": "Mensual", "maxConsultes": 750, "consultesRestants": 9999, "consultesRealitzades": 20},
            ]
        });

        let plans = quota_plans(&payload);

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "XEMA");
        assert_eq!(plans[0].calls_remaining, 730);
    }
}
