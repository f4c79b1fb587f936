//! Semantic roles and their column-name aliases.
//!
//! A role is a field the dashboard understands (who answered, which leader, which site...).
//! Uploaded sheets name these columns inconsistently, so each role carries an ordered list of
//! literal aliases that the column resolver tries in priority order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::RolesConfig;
use crate::dataset::DatasetKind;
use crate::resolve::resolve_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticRole {
    Agent,
    Leader,
    Location,
    Team,
    Skill,
    Date,
    Score,
}

impl SemanticRole {
    pub const ALL: [Self; 7] = [
        Self::Agent,
        Self::Leader,
        Self::Location,
        Self::Team,
        Self::Skill,
        Self::Date,
        Self::Score,
    ];

    /// Categorical filters, in the order they cascade. Date is applied after these.
    pub const FILTER_ORDER: [Self; 4] = [Self::Location, Self::Leader, Self::Team, Self::Skill];

    /// Roles a sheet is scored on when picking the working sheet of a workbook.
    pub const SHEET_SELECTION: [Self; 5] = [
        Self::Agent,
        Self::Leader,
        Self::Location,
        Self::Score,
        Self::Date,
    ];

    /// Roles that can be used as the pivot row dimension.
    pub const PIVOT_ROWS: [Self; 5] = [
        Self::Agent,
        Self::Leader,
        Self::Location,
        Self::Team,
        Self::Skill,
    ];

    /// Roles without which a dataset cannot be analysed.
    pub const MANDATORY: [Self; 2] = [Self::Agent, Self::Score];

    pub fn label(self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Leader => "Leader",
            Self::Location => "Location",
            Self::Team => "Team",
            Self::Skill => "Skill",
            Self::Date => "Date",
            Self::Score => "Score",
        }
    }

    pub fn is_categorical(self) -> bool {
        !matches!(self, Self::Date | Self::Score)
    }

    pub fn is_mandatory(self) -> bool {
        Self::MANDATORY.contains(&self)
    }

    /// Next pivot row role, wrapping around.
    pub fn next_pivot_row(self) -> Self {
        let idx = Self::PIVOT_ROWS
            .iter()
            .position(|r| *r == self)
            .map(|i| (i + 1) % Self::PIVOT_ROWS.len())
            .unwrap_or(0);
        Self::PIVOT_ROWS[idx]
    }

    /// Built-in aliases, most specific first. Score aliases depend on the dataset kind.
    fn builtin_aliases(self, kind: DatasetKind) -> &'static [&'static str] {
        match self {
            Self::Agent => &[
                "Müşteri Temsilcisi Adı",
                "Müşteri Temsilcisi",
                "Temsilci Adı",
                "Temsilci",
                "Asistan",
                "Agent Name",
                "Agent",
            ],
            Self::Leader => &["Takım Lideri", "Takım Lider", "Lider", "Team Leader", "Leader"],
            Self::Location => &["Lokasyon", "Location", "Site", "Şehir"],
            Self::Team => &["Takım", "Takım Adı", "Team", "Grup"],
            Self::Skill => &["Skill İsmi", "Skill Adı", "Skill", "Beceri"],
            Self::Date => &[
                "Çağrı Tarih Saati",
                "Anket Tarihi",
                "Şikayet Tarihi",
                "Tarih",
                "Call Date",
                "Date",
            ],
            Self::Score => match kind {
                DatasetKind::Survey => &["Soru Puan 1", "Puan", "Anket Puanı", "Score"],
                DatasetKind::Calls => &[
                    "Konuşma Süresi",
                    "Görüşme Süresi",
                    "Süre",
                    "Talk Time",
                    "Duration",
                ],
                DatasetKind::Complaints => &[
                    "Şikayet Puanı",
                    "Şikayet Adedi",
                    "Puan",
                    "Severity",
                    "Score",
                ],
            },
        }
    }
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered alias lists per role for one dataset kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAliases {
    aliases: BTreeMap<SemanticRole, Vec<String>>,
}

impl RoleAliases {
    /// Built-in aliases for `kind`.
    pub fn builtin(kind: DatasetKind) -> Self {
        let aliases = SemanticRole::ALL
            .iter()
            .map(|role| {
                let list = role
                    .builtin_aliases(kind)
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                (*role, list)
            })
            .collect();
        Self { aliases }
    }

    /// Built-in aliases with configured ones tried first.
    pub fn from_config(kind: DatasetKind, config: &RolesConfig) -> Self {
        let mut out = Self::builtin(kind);
        for role in SemanticRole::ALL {
            let extra = config.aliases_for(role, kind);
            if extra.is_empty() {
                continue;
            }
            let list = out.aliases.entry(role).or_default();
            let mut merged: Vec<String> = extra.to_vec();
            merged.extend(list.drain(..).filter(|a| !extra.contains(a)));
            *list = merged;
        }
        out
    }

    pub fn get(&self, role: SemanticRole) -> &[String] {
        self.aliases.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(role, aliases)` groups for the given roles, in order.
    pub fn groups(&self, roles: &[SemanticRole]) -> Vec<(SemanticRole, Vec<String>)> {
        roles
            .iter()
            .map(|r| (*r, self.get(*r).to_vec()))
            .collect()
    }
}

/// Physical column chosen for each role of one sheet. Roles without a column are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleMapping {
    columns: BTreeMap<SemanticRole, String>,
}

impl RoleMapping {
    /// Resolve every role against `columns`.
    pub fn resolve(columns: &[String], aliases: &RoleAliases) -> Self {
        let columns = SemanticRole::ALL
            .iter()
            .filter_map(|role| {
                resolve_column(columns, aliases.get(*role)).map(|c| (*role, c))
            })
            .collect();
        Self { columns }
    }

    pub fn column(&self, role: SemanticRole) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn set(&mut self, role: SemanticRole, column: impl Into<String>) {
        self.columns.insert(role, column.into());
    }

    pub fn missing(&self, roles: &[SemanticRole]) -> Vec<SemanticRole> {
        roles
            .iter()
            .copied()
            .filter(|r| !self.columns.contains_key(r))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SemanticRole, &str)> {
        self.columns.iter().map(|(r, c)| (*r, c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mapping_resolves_original_column_names() {
        let aliases = RoleAliases::builtin(DatasetKind::Survey);
        let mapping = RoleMapping::resolve(
            &cols(&[
                "No",
                "Müşteri Temsilcisi Adı",
                "Takım Lideri",
                "Lokasyon",
                "Skill İsmi",
                "Çağrı Tarih Saati",
                "Soru Puan 1",
                "Soru Puan 2",
            ]),
            &aliases,
        );
        assert_eq!(
            mapping.column(SemanticRole::Agent),
            Some("Müşteri Temsilcisi Adı")
        );
        assert_eq!(mapping.column(SemanticRole::Leader), Some("Takım Lideri"));
        assert_eq!(mapping.column(SemanticRole::Skill), Some("Skill İsmi"));
        assert_eq!(mapping.column(SemanticRole::Score), Some("Soru Puan 1"));
        assert_eq!(mapping.column(SemanticRole::Team), None);
        assert_eq!(mapping.missing(&SemanticRole::MANDATORY), vec![]);
    }

    #[test]
    fn test_score_aliases_depend_on_dataset() {
        let calls = RoleAliases::builtin(DatasetKind::Calls);
        let mapping = RoleMapping::resolve(&cols(&["Agent", "Talk Time", "Score"]), &calls);
        assert_eq!(mapping.column(SemanticRole::Score), Some("Talk Time"));
    }

    #[test]
    fn test_configured_aliases_take_priority() {
        let config = RolesConfig {
            agent: vec!["Operatör".to_string()],
            ..Default::default()
        };
        let aliases = RoleAliases::from_config(DatasetKind::Survey, &config);
        assert_eq!(aliases.get(SemanticRole::Agent)[0], "Operatör");
        assert!(aliases
            .get(SemanticRole::Agent)
            .contains(&"Temsilci".to_string()));
        let mapping = RoleMapping::resolve(&cols(&["Temsilci", "OPERATÖR", "Puan"]), &aliases);
        assert_eq!(mapping.column(SemanticRole::Agent), Some("Temsilci"));
    }

    #[test]
    fn test_next_pivot_row_wraps() {
        assert_eq!(SemanticRole::Agent.next_pivot_row(), SemanticRole::Leader);
        assert_eq!(SemanticRole::Skill.next_pivot_row(), SemanticRole::Agent);
        assert_eq!(SemanticRole::Date.next_pivot_row(), SemanticRole::Agent);
    }
}
