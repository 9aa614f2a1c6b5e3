use serde::{Deserialize, Serialize};

/// A monitored host as recorded in the `endpoint` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    /// Host name as reported by the agent
    pub endpoint: String,
    /// Unix seconds of the last report that touched this row
    pub ts: i64,
}

/// A `tag_endpoint` row, linking a free-form tag to an endpoint for search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEndpoint {
    pub id: i64,
    pub tag: String,
    pub endpoint_id: i64,
    pub ts: i64,
}

/// A single time series (`endpoint_counter` row) produced by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCounter {
    pub id: i64,
    pub endpoint_id: i64,
    /// Counter key: `metric` or `metric/k1=v1,k2=v2`
    pub counter: String,
    /// Sampling step in seconds
    pub step: i64,
    /// Series type (GAUGE, COUNTER, DERIVE, ...)
    #[serde(rename = "type")]
    pub counter_type: String,
    pub ts: i64,
}

/// An expired counter together with the name of the endpoint that owns it.
///
/// The name is resolved while the endpoint row still exists, i.e. before the
/// bulk deletes run, so the artifact path can be rebuilt afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredCounter {
    pub endpoint: String,
    pub counter: EndpointCounter,
}

/// Everything the selector found for one cutoff.
#[derive(Debug, Clone, Default)]
pub struct ExpiredIndex {
    pub endpoints: Vec<Endpoint>,
    pub tag_endpoints: Vec<TagEndpoint>,
    pub counters: Vec<ExpiredCounter>,
}

impl ExpiredIndex {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.tag_endpoints.is_empty() && self.counters.is_empty()
    }
}

/// Index tables aged by the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTable {
    Endpoint,
    TagEndpoint,
    EndpointCounter,
}

impl IndexTable {
    pub const ALL: [IndexTable; 3] = [
        IndexTable::Endpoint,
        IndexTable::TagEndpoint,
        IndexTable::EndpointCounter,
    ];

    /// SQL table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            IndexTable::Endpoint => "endpoint",
            IndexTable::TagEndpoint => "tag_endpoint",
            IndexTable::EndpointCounter => "endpoint_counter",
        }
    }

    /// Name of the statistics sub-count holding this table's deleted rows.
    pub fn stat_name(&self) -> &'static str {
        match self {
            IndexTable::Endpoint => "deleteCntEndpoint",
            IndexTable::TagEndpoint => "deleteCntTagEndpoint",
            IndexTable::EndpointCounter => "deleteCntEndpointCounter",
        }
    }
}

impl std::fmt::Display for IndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            IndexTable::ALL.iter().map(|t| t.stat_name()).collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_counter_type_serializes_as_type() {
        let counter = EndpointCounter {
            id: 1,
            endpoint_id: 2,
            counter: "cpu.idle".to_string(),
            step: 60,
            counter_type: "GAUGE".to_string(),
            ts: 0,
        };
        let json = serde_json::to_value(&counter).unwrap();
        assert_eq!(json["type"], "GAUGE");
    }

    #[test]
    fn test_expired_index_is_empty() {
        let mut index = ExpiredIndex::default();
        assert!(index.is_empty());
        index.tag_endpoints.push(TagEndpoint {
            id: 1,
            tag: "env=prod".to_string(),
            endpoint_id: 1,
            ts: 0,
        });
        assert!(!index.is_empty());
    }
}
