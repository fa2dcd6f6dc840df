use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

pub const STATUS_UNDER_ANALYSIS: &str = "Em Análise";
pub const STATUS_DELIVERED: &str = "Aprovado - Entregue";
pub const DELIVERY_MARKER: &str = "entregue";

pub const PLACEHOLDER_CLIENT: &str = "Cliente não identificado";
pub const PLACEHOLDER_EQUIPMENT: &str = "Equipamento antigo";
pub const PLACEHOLDER_PRICE: &str = "R$ 0,00";
pub const PLACEHOLDER_DIAGNOSIS: &str = "Verificar arquivo físico";
pub const RECOVERED_NOTES: &str = "Recuperado de arquivo legado";

/// Free-form status label. The vocabulary is informal, so this stays a
/// string with recognizer predicates instead of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn under_analysis() -> Self {
        Self::new(STATUS_UNDER_ANALYSIS)
    }

    pub fn delivered() -> Self {
        Self::new(STATUS_DELIVERED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_delivered(&self) -> bool {
        self.0.to_lowercase().contains(DELIVERY_MARKER)
    }

    /// Derive a status from a document filename: a delivery marker anywhere
    /// in the name means the ticket was handed back.
    pub fn from_file_name(file_name: &str) -> Self {
        if file_name.to_lowercase().contains(DELIVERY_MARKER) {
            Self::delivered()
        } else {
            Self::under_analysis()
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::under_analysis()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single service ticket. Field names on disk follow the store files
/// written by earlier versions of the application, which never enforced a
/// schema: nulls and numbers stand in for strings, and unknown keys are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    #[serde(rename = "os", alias = "id", default, deserialize_with = "lenient::number")]
    pub id: u32,
    #[serde(rename = "data", alias = "createdDate", default, deserialize_with = "lenient::text")]
    pub created_date: String,
    #[serde(rename = "cliente", alias = "client", default, deserialize_with = "lenient::text")]
    pub client: String,
    #[serde(rename = "telefone", alias = "phone", default, deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(
        rename = "impressora",
        alias = "equipmentLabel",
        default,
        deserialize_with = "lenient::text"
    )]
    pub equipment_label: String,
    #[serde(
        rename = "orcamento",
        alias = "diagnosisOrEstimate",
        default,
        deserialize_with = "lenient::text"
    )]
    pub diagnosis_or_estimate: String,
    #[serde(rename = "valor", alias = "price", default, deserialize_with = "lenient::text")]
    pub price: String,
    #[serde(rename = "obs", alias = "notes", default, deserialize_with = "lenient::text")]
    pub notes: String,
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: Status,
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    #[serde(
        rename = "ultimo_numero",
        alias = "lastNumber",
        default,
        deserialize_with = "lenient::number"
    )]
    pub last_number: u32,
    #[serde(
        rename = "historico",
        alias = "records",
        default,
        deserialize_with = "lenient::records"
    )]
    pub records: Vec<WorkOrder>,
}

mod lenient {
    use super::{Status, WorkOrder};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        Ok(match Option::<Value>::deserialize(de)? {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        })
    }

    /// Ids arrive as numbers or numeric strings. Anything else reads as 0,
    /// which `Store::validate` then reports.
    pub fn number<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
        let parsed = match Option::<Value>::deserialize(de)? {
            Some(Value::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(parsed.and_then(|v| u32::try_from(v).ok()).unwrap_or(0))
    }

    pub fn status<'de, D: Deserializer<'de>>(de: D) -> Result<Status, D::Error> {
        let label = text(de)?;
        if label.trim().is_empty() {
            Ok(Status::default())
        } else {
            Ok(Status::new(label))
        }
    }

    pub fn records<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<WorkOrder>, D::Error> {
        Ok(Option::<Vec<WorkOrder>>::deserialize(de)?.unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreIssue {
    ZeroId,
    DuplicateId(u32),
    CounterBehind { last_number: u32, max_id: u32 },
}

impl fmt::Display for StoreIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroId => write!(f, "record with id 0"),
            Self::DuplicateId(id) => write!(f, "duplicate record id {id}"),
            Self::CounterBehind {
                last_number,
                max_id,
            } => write!(f, "last number {last_number} is below max record id {max_id}"),
        }
    }
}

impl Store {
    pub fn empty(seed_last_number: u32) -> Self {
        Self {
            last_number: seed_last_number,
            records: Vec::new(),
        }
    }

    pub fn max_id(&self) -> Option<u32> {
        self.records.iter().map(|r| r.id).max()
    }

    pub fn next_id(&self) -> u32 {
        self.last_number.max(self.max_id().unwrap_or(0)).saturating_add(1)
    }

    pub fn get(&self, id: u32) -> Option<&WorkOrder> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_delivered()).count()
    }

    pub fn validate(&self) -> Vec<StoreIssue> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for record in &self.records {
            if record.id == 0 {
                if reported.insert(0) {
                    issues.push(StoreIssue::ZeroId);
                }
                continue;
            }
            if !seen.insert(record.id) && reported.insert(record.id) {
                issues.push(StoreIssue::DuplicateId(record.id));
            }
        }
        if let Some(max_id) = self.max_id() {
            if self.last_number < max_id {
                issues.push(StoreIssue::CounterBehind {
                    last_number: self.last_number,
                    max_id,
                });
            }
        }
        issues
    }
}

/// Where a recovered value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Content,
    Filename,
    Placeholder,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Filename => "filename",
            Self::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub value: String,
    pub provenance: Provenance,
}

impl Field {
    pub fn content(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            provenance: Provenance::Content,
        }
    }

    pub fn filename(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            provenance: Provenance::Filename,
        }
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            provenance: Provenance::Placeholder,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.provenance == Provenance::Placeholder
    }
}

/// Attributes mined from a single document, before file metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedDocument {
    pub client: Field,
    pub phone: Field,
    pub equipment: Field,
    pub price: Field,
    pub status: Status,
}

impl MinedDocument {
    pub fn fallback(file_name: &str) -> Self {
        Self {
            client: Field::placeholder(PLACEHOLDER_CLIENT),
            phone: Field::placeholder(""),
            equipment: Field::placeholder(PLACEHOLDER_EQUIPMENT),
            price: Field::placeholder(PLACEHOLDER_PRICE),
            status: Status::from_file_name(file_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredCandidate {
    pub id: u32,
    pub created_date: String,
    pub client: Field,
    pub phone: Field,
    pub equipment: Field,
    pub price: Field,
    pub diagnosis_or_estimate: String,
    pub notes: String,
    pub status: Status,
    pub source_file: PathBuf,
    pub source_file_timestamp: u64,
}

impl RecoveredCandidate {
    pub fn from_mined(
        id: u32,
        mined: MinedDocument,
        created_date: String,
        source_file: PathBuf,
        source_file_timestamp: u64,
    ) -> Self {
        Self {
            id,
            created_date,
            client: mined.client,
            phone: mined.phone,
            equipment: mined.equipment,
            price: mined.price,
            diagnosis_or_estimate: PLACEHOLDER_DIAGNOSIS.to_string(),
            notes: RECOVERED_NOTES.to_string(),
            status: mined.status,
            source_file,
            source_file_timestamp,
        }
    }

    pub fn has_resolved_client(&self) -> bool {
        !self.client.is_placeholder()
    }

    pub fn into_work_order(self) -> WorkOrder {
        WorkOrder {
            id: self.id,
            created_date: self.created_date,
            client: self.client.value,
            phone: self.phone.value,
            equipment_label: self.equipment.value,
            diagnosis_or_estimate: self.diagnosis_or_estimate,
            price: self.price.value,
            notes: self.notes,
            status: self.status,
            extra: Map::new(),
        }
    }
}

/// Parse a currency display value such as `R$ 1.234,56` into a number.
/// Unparseable input yields 0.
pub fn parse_price(value: &str) -> f64 {
    let digits: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '-')
        .collect();
    digits.replacen(',', ".", 1).parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
pub(crate) fn order(id: u32, client: &str) -> WorkOrder {
    WorkOrder {
        id,
        created_date: "01/02/2024".to_string(),
        client: client.to_string(),
        phone: String::new(),
        equipment_label: "HP 2774".to_string(),
        diagnosis_or_estimate: "Em andamento".to_string(),
        price: "R$ 90,00".to_string(),
        notes: String::new(),
        status: Status::under_analysis(),
        extra: Map::new(),
    }
}
