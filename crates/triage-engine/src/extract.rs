//! Turn fetched bundles into ticket records

use std::collections::HashMap;

use serde_json::{Map, Value};
use triage_core::{AnalysisPayload, Schema, TicketRecord, filter, filter_value};
use triage_security::Scrubber;
use triage_sources::TicketBundle;

/// Department id to name, built from the helpdesk department list
pub fn department_names(departments: &[Value]) -> HashMap<u64, String> {
    departments
        .iter()
        .filter_map(|d| {
            let id = d.get("id")?.as_u64()?;
            let name = d.get("name")?.as_str()?;
            Some((id, name.to_string()))
        })
        .collect()
}

pub struct Extractor<'a> {
    schema: &'a Schema,
    scrubber: Scrubber,
    departments: HashMap<u64, String>,
}

impl<'a> Extractor<'a> {
    pub fn new(schema: &'a Schema, scrubber: Scrubber, departments: HashMap<u64, String>) -> Self {
        Self {
            schema,
            scrubber,
            departments,
        }
    }

    /// Filter, then scrub. The analysis payload and the department name come
    /// from the filtered data only, so nothing outside the selection reaches
    /// the model.
    pub fn extract(&self, bundle: TicketBundle) -> TicketRecord {
        let data = self.scrub_map(&filter(&bundle.ticket, &self.schema.ticket));
        let department = data
            .get("department_id")
            .and_then(Value::as_u64)
            .and_then(|id| self.departments.get(&id).cloned());

        let conversations: Vec<Value> = bundle
            .conversations
            .iter()
            .map(|c| self.scrubber.scrub(&filter_value(c, &self.schema.conversation)))
            .collect();
        let requester = bundle
            .requester
            .as_ref()
            .map(|r| self.scrubber.scrub(&filter_value(r, &self.schema.requester)));

        let analysis_payload = AnalysisPayload::build(&bundle.id, &data, &conversations);

        TicketRecord {
            id: bundle.id,
            data,
            conversations,
            requester,
            department,
            analysis_payload,
        }
    }

    fn scrub_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        match self.scrubber.scrub(&Value::Object(map.clone())) {
            Value::Object(scrubbed) => scrubbed,
            _ => Map::new(),
        }
    }
}
