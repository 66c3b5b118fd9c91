use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cds_model::{CdsType, ElementType, Entity, Model};
use cqn::{Column, DataValue, Delete, Insert, Query, Select, Update};
use parking_lot::RwLock;

use super::eval::{compare_values, matches, value_of, Row};
use super::{ExecError, ExecResult, QueryExecutor};

/// Tables held in process memory, one per entity of the model.
pub struct MemoryStore {
    model: Arc<Model>,
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn entity(&self, name: &str) -> Result<&Entity, ExecError> {
        self.model
            .entity(name)
            .ok_or_else(|| ExecError::UnknownEntity(name.to_string()))
    }

    /// Load `<dir>/<Entity>.json` (full name, else short name) for every
    /// entity of the model. Each file holds a JSON array of rows. Returns the
    /// number of rows loaded.
    pub fn seed_from_dir(&self, dir: &Path) -> Result<usize, ExecError> {
        let mut loaded = 0;
        for entity in self.model_entities() {
            let candidates = [
                dir.join(format!("{}.json", entity.name)),
                dir.join(format!("{}.json", entity.short_name())),
            ];
            let Some(path) = candidates.iter().find(|p| p.is_file()) else {
                continue;
            };
            let raw = std::fs::read_to_string(path).map_err(|source| ExecError::Seed {
                path: path.display().to_string(),
                source,
            })?;
            let rows: Vec<serde_json::Value> =
                serde_json::from_str(&raw).map_err(|e| ExecError::SeedFormat {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let count = rows.len();
            self.seed(&entity.name, rows.into_iter().map(DataValue::from).collect())?;
            tracing::debug!(entity = %entity.name, rows = count, file = %path.display(), "seeded table");
            loaded += count;
        }
        Ok(loaded)
    }

    fn model_entities(&self) -> Vec<&Entity> {
        self.model
            .services()
            .flat_map(|s| self.model.service_entities(&s.name))
            .collect()
    }

    /// Append rows without key checks. Rows must be objects; base64 text in
    /// binary elements is decoded.
    pub fn seed(&self, entity: &str, rows: Vec<DataValue>) -> Result<(), ExecError> {
        let def = self.entity(entity)?;
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_string()).or_default();
        for mut row in rows {
            odata_cqn::decode_binaries(&mut row, def, &self.model)
                .map_err(|e| ExecError::invalid_data(entity, e.to_string()))?;
            let DataValue::Object(mut row) = row else {
                return Err(ExecError::invalid_data(entity, "seed rows must be objects"));
            };
            fill_generated_keys(def, &mut row);
            table.push(row);
        }
        Ok(())
    }

    /// Current number of rows of `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.tables.read().get(entity).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, entity: &str) -> bool {
        self.len(entity) == 0
    }

    fn select(&self, q: &Select) -> Result<ExecResult, ExecError> {
        let entity = q.from.name();
        self.entity(entity)?;
        let tables = self.tables.read();
        let rows = tables.get(entity).map(Vec::as_slice).unwrap_or_default();

        let mut hits = Vec::new();
        for row in rows {
            if matches(&q.where_, row)? {
                hits.push(row);
            }
        }

        if q.is_count() {
            return Ok(ExecResult::Count(hits.len() as u64));
        }

        if !q.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(hits.len());
            for row in hits {
                let values = q
                    .order_by
                    .iter()
                    .map(|o| value_of(&o.expr, row))
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.push((values, row));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                q.order_by
                    .iter()
                    .zip(a.iter().zip(b.iter()))
                    .map(|(o, (x, y))| match o.sort {
                        cqn::Sort::Asc => compare_values(x, y),
                        cqn::Sort::Desc => compare_values(y, x),
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits = keyed.into_iter().map(|(_, row)| row).collect();
        }

        let (offset, rows) = match &q.limit {
            Some(limit) => (
                usize::try_from(limit.offset).unwrap_or(usize::MAX),
                limit.rows.map(|r| usize::try_from(r).unwrap_or(usize::MAX)),
            ),
            None => (0, None),
        };
        let take = if q.one { Some(1) } else { rows };

        let out = hits
            .into_iter()
            .skip(offset)
            .take(take.unwrap_or(usize::MAX))
            .map(|row| project(row, q.columns.as_deref()))
            .collect();
        Ok(ExecResult::Rows(out))
    }

    fn insert(&self, q: &Insert) -> Result<ExecResult, ExecError> {
        let name = q.into.name();
        let entity = self.entity(name)?;
        let mut tables = self.tables.write();
        let table = tables.entry(name.to_string()).or_default();

        let mut created = Vec::with_capacity(q.entries.len());
        for entry in &q.entries {
            let Some(fields) = entry.as_object() else {
                return Err(ExecError::invalid_data(name, "entries must be objects"));
            };
            let mut row = fields.clone();
            fill_generated_keys(entity, &mut row);

            let key = key_of(entity, &row)
                .ok_or_else(|| ExecError::invalid_data(name, "missing key element"))?;
            if table.iter().any(|existing| key_of(entity, existing).as_ref() == Some(&key)) {
                return Err(ExecError::Conflict {
                    entity: name.to_string(),
                    key: describe_key(&key),
                });
            }
            table.push(row.clone());
            created.push(DataValue::Object(row));
        }
        Ok(ExecResult::Rows(created))
    }

    fn update(&self, q: &Update) -> Result<ExecResult, ExecError> {
        let name = q.entity.name();
        self.entity(name)?;
        let Some(changes) = q.data.as_object() else {
            return Err(ExecError::invalid_data(name, "update data must be an object"));
        };

        let mut tables = self.tables.write();
        let table = tables.entry(name.to_string()).or_default();
        let mut updated = Vec::new();
        for row in table.iter_mut() {
            if !matches(&q.where_, row)? {
                continue;
            }
            for (k, v) in changes {
                row.insert(k.clone(), v.clone());
            }
            updated.push(DataValue::Object(row.clone()));
        }
        Ok(ExecResult::Rows(updated))
    }

    fn delete(&self, q: &Delete) -> Result<ExecResult, ExecError> {
        let name = q.from.name();
        self.entity(name)?;
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(name) else {
            return Ok(ExecResult::Affected(0));
        };

        let before = table.len();
        let mut failure = None;
        table.retain(|row| match matches(&q.where_, row) {
            Ok(hit) => !hit,
            Err(e) => {
                failure.get_or_insert(e);
                true
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(ExecResult::Affected((before - table.len()) as u64))
    }
}

type Key = Vec<(String, serde_json::Value)>;

fn key_of(entity: &Entity, row: &Row) -> Option<Key> {
    entity
        .keys()
        .map(|k| Some((k.name.clone(), row.get(&k.name)?.to_json())))
        .collect()
}

fn describe_key(key: &Key) -> String {
    key.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Server-generated key values: UUID keys get a fresh v4, the draft flag
/// defaults to the active version.
fn fill_generated_keys(entity: &Entity, row: &mut Row) {
    for key in entity.keys() {
        if row.get(&key.name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        match &key.ty {
            ElementType::Primitive(CdsType::Uuid) => {
                row.insert(
                    key.name.clone(),
                    DataValue::String(uuid::Uuid::new_v4().to_string()),
                );
            }
            ElementType::Primitive(CdsType::Boolean) if key.name == "IsActiveEntity" => {
                row.insert(key.name.clone(), DataValue::Bool(true));
            }
            _ => {}
        }
    }
}

fn project(row: &Row, columns: Option<&[Column]>) -> DataValue {
    let Some(columns) = columns else {
        return DataValue::Object(row.clone());
    };
    let mut out = Row::new();
    for name in columns.iter().filter_map(Column::as_name) {
        if let Some(v) = row.get(name) {
            out.insert(name.to_string(), v.clone());
        }
    }
    DataValue::Object(out)
}

#[async_trait]
impl QueryExecutor for MemoryStore {
    async fn execute(&self, query: &Query) -> Result<ExecResult, ExecError> {
        let result = match query {
            Query::Select(q) => self.select(q),
            Query::Insert(q) => self.insert(q),
            Query::Update(q) => self.update(q),
            Query::Delete(q) => self.delete(q),
        };
        tracing::trace!(verb = query.kind(), entity = query.entity(), ok = result.is_ok(), "executed query");
        result
    }
}
