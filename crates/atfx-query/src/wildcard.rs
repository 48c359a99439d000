//! Result rows for wildcard selections ("all attributes and to-one relations").

use atfx_model::{Aid, AtfxCache, AttrNo, DataType, Iid, RelId, TypedValue, Value};

use crate::error::QueryResult;

/// Source of a wildcard column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Application attribute.
    Attribute(AttrNo),
    /// To-one relation; cells hold the related instance id.
    Relation(RelId),
}

/// A column of a wildcard result.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardColumn {
    /// Attribute or relation name.
    pub name: String,
    /// Declared data type (`DT_LONGLONG` for relations).
    pub data_type: DataType,
    /// Where the cells come from.
    pub source: ColumnSource,
}

/// One row of a wildcard result.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardRow {
    /// Instance id.
    pub iid: Iid,
    /// Cells in column order.
    pub values: Vec<TypedValue>,
}

/// Wildcard result: columns plus one row per requested instance.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardResult {
    /// Element the rows belong to.
    pub aid: Aid,
    /// Attributes in element order, followed by the to-one relations.
    pub columns: Vec<WildcardColumn>,
    /// Rows in request order.
    pub rows: Vec<WildcardRow>,
}

impl WildcardResult {
    /// Returns the index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns a cell.
    pub fn cell(&self, row: usize, column: &str) -> Option<&TypedValue> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.values.get(index)
    }
}

/// Builds wildcard results, reading only through the cache's public accessors.
///
/// # Example
///
/// ```ignore
/// let result = WildcardResultBuilder::new(&cache).build(meas, &iids)?;
/// for row in &result.rows {
///     println!("{}: {:?}", row.iid, row.values);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WildcardResultBuilder<'a> {
    cache: &'a AtfxCache,
}

impl<'a> WildcardResultBuilder<'a> {
    /// Creates a builder over a cache.
    pub fn new(cache: &'a AtfxCache) -> Self {
        Self { cache }
    }

    /// Returns the wildcard columns of an element.
    pub fn columns(&self, aid: Aid) -> QueryResult<Vec<WildcardColumn>> {
        let element = self.cache.element(aid)?;
        let mut columns: Vec<WildcardColumn> = element
            .attributes()
            .iter()
            .map(|a| WildcardColumn {
                name: a.name().to_string(),
                data_type: a.data_type(),
                source: ColumnSource::Attribute(a.attr_no()),
            })
            .collect();
        columns.extend(
            self.cache
                .relations_of(aid)?
                .into_iter()
                .filter(|r| r.is_bound() && r.is_to_one())
                .map(|r| WildcardColumn {
                    name: r.name().to_string(),
                    data_type: DataType::DtLongLong,
                    source: ColumnSource::Relation(r.id()),
                }),
        );
        Ok(columns)
    }

    /// Builds one row per instance of `iids`.
    pub fn build(&self, aid: Aid, iids: &[Iid]) -> QueryResult<WildcardResult> {
        let columns = self.columns(aid)?;
        let mut rows = Vec::with_capacity(iids.len());
        for &iid in iids {
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                values.push(self.cell(aid, iid, column)?);
            }
            rows.push(WildcardRow { iid, values });
        }
        Ok(WildcardResult { aid, columns, rows })
    }

    fn cell(&self, aid: Aid, iid: Iid, column: &WildcardColumn) -> QueryResult<TypedValue> {
        let cell = match column.source {
            ColumnSource::Attribute(attr_no) => {
                match self.cache.get_value(aid, iid, attr_no)?.cloned() {
                    // attributes of unknown type report the stored value's type
                    Some(value) if column.data_type == DataType::DtUnknown => TypedValue::new(value),
                    value => TypedValue {
                        data_type: column.data_type,
                        value,
                    },
                }
            }
            ColumnSource::Relation(rel) => {
                let target = self.cache.related_ids(aid, iid, rel)?.into_iter().next();
                TypedValue {
                    data_type: DataType::DtLongLong,
                    value: target.map(|t| Value::LongLong(i64::try_from(t).unwrap_or(i64::MAX))),
                }
            }
        };
        Ok(cell)
    }
}
