//! PCB assemblies and users.
//!
//! A PCB is keyed by `(board_name, rev)` and lists the parts one board
//! consumes. Each line either names one part by IPN or describes a generic
//! part as filter clauses over a part type, so any stocked part matching
//! the clauses can fill it:
//!
//! ```json
//! {"board_name":"amp","rev":"A","stock":2,"parts":[
//!   {"quantity":4,"reference":"R1-R4","part":{"kind":"generic","type":"resistor","clauses":["resistance == 10000"]}},
//!   {"quantity":1,"reference":"U1","part":{"kind":"specific","ipn":"NE5532"}}]}
//! ```

use crate::driver::StorageDriver;
use crate::error::RepoError;
use crate::memory::PartStore;
use crate::record::PartRecord;
use crate::repository::PartRepository;
use partdb_kernel::{FilterClause, SpecRegistry, ValidationError, apply, parse_clause};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One board design at one revision, and how many are on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pcb {
    pub board_name: String,
    pub rev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_rev: Option<String>,
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub parts: Vec<PcbPart>,
}

impl Pcb {
    pub fn new(board_name: impl Into<String>, rev: impl Into<String>, stock: i64) -> Self {
        Self {
            board_name: board_name.into(),
            rev: rev.into(),
            sub_rev: None,
            stock,
            storage: None,
            comments: None,
            parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: PcbPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn is(&self, board_name: &str, rev: &str) -> bool {
        self.board_name == board_name && self.rev == rev
    }
}

/// One bill-of-materials line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbPart {
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub part: PartSelector,
}

impl PcbPart {
    pub fn specific(quantity: u32, ipn: impl Into<String>) -> Self {
        Self {
            quantity,
            reference: None,
            part: PartSelector::Specific { ipn: ipn.into() },
        }
    }

    pub fn generic(quantity: u32, type_name: impl Into<String>, clauses: Vec<String>) -> Self {
        Self {
            quantity,
            reference: None,
            part: PartSelector::Generic {
                type_name: type_name.into(),
                clauses,
            },
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Which stocked parts can fill a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartSelector {
    Specific {
        ipn: String,
    },
    Generic {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        clauses: Vec<String>,
    },
}

impl PartSelector {
    /// `R-4k7`, or `resistor where resistance == 4700`.
    pub fn describe(&self) -> String {
        match self {
            Self::Specific { ipn } => ipn.clone(),
            Self::Generic { type_name, clauses } if clauses.is_empty() => {
                format!("any {type_name}")
            }
            Self::Generic { type_name, clauses } => {
                format!("{type_name} where {}", clauses.join(" and "))
            }
        }
    }
}

/// Someone parts can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comments: None,
        }
    }
}

/// How well stock covers one line of a board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartAvailability {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub description: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub candidates: Vec<PartRecord>,
    pub in_stock: i64,
}

impl PartAvailability {
    /// Candidates together stock enough for one board.
    pub fn covered(&self) -> bool {
        self.in_stock >= i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardAvailability {
    pub pcb: Pcb,
    pub parts: Vec<PartAvailability>,
}

impl BoardAvailability {
    pub fn buildable(&self) -> bool {
        self.parts.iter().all(PartAvailability::covered)
    }
}

fn required_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn generic_clauses(
    registry: &SpecRegistry,
    type_name: &str,
    raw: &[String],
) -> Result<Vec<FilterClause>, ValidationError> {
    let spec = registry.get(type_name)?;
    raw.iter().map(|clause| parse_clause(clause, spec)).collect()
}

/// A PCB ready to persist: keys present, every line resolvable, generic
/// clauses rewritten in canonical form.
fn validated_pcb(registry: &SpecRegistry, parts: &PartStore, mut pcb: Pcb) -> Result<Pcb, RepoError> {
    required_text("board_name", &pcb.board_name)?;
    required_text("rev", &pcb.rev)?;
    if pcb.stock < 0 {
        return Err(ValidationError::NegativeValue {
            field: "stock".to_string(),
            value: pcb.stock,
        }
        .into());
    }
    for (index, line) in pcb.parts.iter_mut().enumerate() {
        if line.quantity == 0 {
            return Err(RepoError::InvalidPcb {
                board_name: pcb.board_name.clone(),
                rev: pcb.rev.clone(),
                reason: format!("line {} needs a quantity of at least 1", index + 1),
            });
        }
        match &mut line.part {
            PartSelector::Specific { ipn } => {
                if !parts.contains(ipn) {
                    return Err(RepoError::UnknownIpn(ipn.clone()));
                }
            }
            PartSelector::Generic { type_name, clauses } => {
                *clauses = generic_clauses(registry, type_name, clauses)?
                    .iter()
                    .map(ToString::to_string)
                    .collect();
            }
        }
    }
    Ok(pcb)
}

impl<D: StorageDriver> PartRepository<'_, D> {
    /// One lock-scoped read-modify-write of the PCB collection.
    fn transact_pcbs<T>(
        &self,
        mutator: impl FnOnce(&mut Vec<Pcb>) -> Result<(T, bool), RepoError>,
    ) -> Result<T, RepoError> {
        let _lock = self.driver().lock()?;
        let mut pcbs = self.driver().read_pcbs()?;
        let (value, changed) = mutator(&mut pcbs)?;
        if changed {
            pcbs.sort_by(|a, b| (&a.board_name, &a.rev).cmp(&(&b.board_name, &b.rev)));
            self.driver().write_pcbs(&pcbs)?;
        }
        Ok(value)
    }

    fn transact_users<T>(
        &self,
        mutator: impl FnOnce(&mut Vec<User>) -> Result<(T, bool), RepoError>,
    ) -> Result<T, RepoError> {
        let _lock = self.driver().lock()?;
        let mut users = self.driver().read_users()?;
        let (value, changed) = mutator(&mut users)?;
        if changed {
            users.sort_by(|a, b| a.name.cmp(&b.name));
            self.driver().write_users(&users)?;
        }
        Ok(value)
    }

    /// Add a PCB. `(board_name, rev)` must be new; specific lines must name
    /// stored parts and generic lines must parse against their type.
    pub fn add_pcb(&self, pcb: Pcb) -> Result<(), RepoError> {
        let parts = self.driver().read_parts()?;
        let pcb = validated_pcb(self.registry(), &parts, pcb)?;
        let (board_name, rev) = (pcb.board_name.clone(), pcb.rev.clone());
        self.transact_pcbs(|pcbs| {
            if pcbs.iter().any(|p| p.is(&pcb.board_name, &pcb.rev)) {
                return Err(RepoError::DuplicatePcb {
                    board_name: pcb.board_name,
                    rev: pcb.rev,
                });
            }
            pcbs.push(pcb);
            Ok(((), true))
        })?;
        debug!(board_name, rev, "pcb added");
        Ok(())
    }

    pub fn get_pcb(&self, board_name: &str, rev: &str) -> Result<Pcb, RepoError> {
        self.driver()
            .read_pcbs()?
            .into_iter()
            .find(|p| p.is(board_name, rev))
            .ok_or_else(|| unknown_pcb(board_name, rev))
    }

    /// Every PCB, or the revisions of one board, ordered by name then rev.
    pub fn list_pcbs(&self, board_name: Option<&str>) -> Result<Vec<Pcb>, RepoError> {
        let mut pcbs = self.driver().read_pcbs()?;
        if let Some(board_name) = board_name {
            pcbs.retain(|p| p.board_name == board_name);
        }
        pcbs.sort_by(|a, b| (&a.board_name, &a.rev).cmp(&(&b.board_name, &b.rev)));
        Ok(pcbs)
    }

    pub fn delete_pcb(&self, board_name: &str, rev: &str) -> Result<Pcb, RepoError> {
        let removed = self.transact_pcbs(|pcbs| {
            let index = pcbs
                .iter()
                .position(|p| p.is(board_name, rev))
                .ok_or_else(|| unknown_pcb(board_name, rev))?;
            Ok((pcbs.remove(index), true))
        })?;
        debug!(board_name, rev, "pcb deleted");
        Ok(removed)
    }

    /// Add `delta` boards to stock, failing like [`adjust_stock`] below zero.
    ///
    /// [`adjust_stock`]: PartRepository::adjust_stock
    pub fn adjust_pcb_stock(&self, board_name: &str, rev: &str, delta: i64) -> Result<i64, RepoError> {
        self.transact_pcbs(|pcbs| {
            let pcb = pcbs
                .iter_mut()
                .find(|p| p.is(board_name, rev))
                .ok_or_else(|| unknown_pcb(board_name, rev))?;
            let label = format!("{board_name} rev {rev}");
            let new = pcb
                .stock
                .checked_add(delta)
                .ok_or_else(|| RepoError::StockOverflow { ipn: label.clone() })?;
            if new < 0 {
                return Err(RepoError::NegativeStock {
                    ipn: label,
                    amount_to_zero: pcb.stock,
                });
            }
            pcb.stock = new;
            Ok((new, true))
        })
    }

    /// Match every line of a PCB against stocked parts.
    pub fn pcb_availability(&self, board_name: &str, rev: &str) -> Result<BoardAvailability, RepoError> {
        let pcb = self.get_pcb(board_name, rev)?;
        let store = self.driver().read_parts()?;
        let mut lines = Vec::with_capacity(pcb.parts.len());
        for line in &pcb.parts {
            let (type_name, candidates) = match &line.part {
                PartSelector::Specific { ipn } => match store.get(ipn) {
                    Some(record) => (Some(record.type_name.clone()), vec![record.clone()]),
                    None => (None, Vec::new()),
                },
                PartSelector::Generic { type_name, clauses } => {
                    let clauses = generic_clauses(self.registry(), type_name, clauses)?;
                    let records: Vec<PartRecord> = store.records_of(type_name).cloned().collect();
                    (Some(type_name.clone()), apply(records, &clauses))
                }
            };
            lines.push(PartAvailability {
                quantity: line.quantity,
                reference: line.reference.clone(),
                description: line.part.describe(),
                type_name,
                in_stock: candidates.iter().map(PartRecord::stock).sum(),
                candidates,
            });
        }
        Ok(BoardAvailability { pcb, parts: lines })
    }

    /// Add a user. Names are unique.
    pub fn add_user(&self, user: User) -> Result<(), RepoError> {
        required_text("name", &user.name)?;
        let name = user.name.clone();
        self.transact_users(|users| {
            if users.iter().any(|u| u.name == user.name) {
                return Err(RepoError::DuplicateUser(user.name));
            }
            users.push(user);
            Ok(((), true))
        })?;
        debug!(name, "user added");
        Ok(())
    }

    pub fn get_user(&self, name: &str) -> Result<User, RepoError> {
        self.driver()
            .read_users()?
            .into_iter()
            .find(|u| u.name == name)
            .ok_or_else(|| RepoError::UnknownUser(name.to_string()))
    }

    pub fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let mut users = self.driver().read_users()?;
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }
}

fn unknown_pcb(board_name: &str, rev: &str) -> RepoError {
    RepoError::UnknownPcb {
        board_name: board_name.to_string(),
        rev: rev.to_string(),
    }
}
