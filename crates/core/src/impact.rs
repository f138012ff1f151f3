#![forbid(unsafe_code)]

use crate::model::Unit;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImpactQuery {
    pub changed_files: Vec<String>,
    pub changed_apis: Vec<String>,
    pub changed_tables: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImpactedUnit {
    pub unit_id: String,
    pub title: String,
    pub reasons: Vec<String>,
}

/// Matches a unit's declared touchpoints (`meta.touchpoints.{files,api,db_tables}`) and
/// `meta.tags` against a change set. A changed item hits when it contains a touchpoint.
pub fn impact_of(unit: &Unit, query: &ImpactQuery) -> Option<ImpactedUnit> {
    let touchpoints = unit.meta.get("touchpoints");
    let files = string_list(touchpoints.and_then(|t| t.get("files")));
    let apis = string_list(touchpoints.and_then(|t| t.get("api")));
    let tables = string_list(touchpoints.and_then(|t| t.get("db_tables")));
    let tags = string_list(unit.meta.get("tags"));

    let mut reasons = Vec::new();
    if let Some(file) = first_hit(&query.changed_files, &files) {
        reasons.push(format!("file:{file}"));
    }
    if let Some(api) = first_hit(&query.changed_apis, &apis) {
        reasons.push(format!("api:{api}"));
    }
    if let Some(table) = first_hit(&query.changed_tables, &tables) {
        reasons.push(format!("table:{table}"));
    }
    if !query.tags.is_empty() && contains_any(&tags.join(","), &query.tags) {
        reasons.push("tag".to_string());
    }

    if reasons.is_empty() {
        return None;
    }
    Some(ImpactedUnit {
        unit_id: unit.unit_id.clone(),
        title: unit.title.clone(),
        reasons,
    })
}

fn first_hit<'a>(changed: &'a [String], needles: &[String]) -> Option<&'a str> {
    changed
        .iter()
        .find(|item| contains_any(item, needles))
        .map(String::as_str)
}

fn contains_any(hay: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && hay.contains(needle.as_str()))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
