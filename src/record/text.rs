//! Column-position text records.
//!
//! A [`TextSchema`] describes which character columns of a line hold which
//! field. Layouts are usually written in the compact format used by fixed
//! width archives: comma separated end columns, each optionally followed by a
//! type letter, with every field starting where the previous one ended.
//!
//! ```text
//! "11L,15i,19"  ->  cols 0..11 as long, 11..15 as int, 15..19 as text
//! ```

use crate::error::{CdmError, Result};
use crate::model::{DataType, Value};
use std::fmt;
use std::sync::Arc;

/// How the characters of a column are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// 64-bit integer (`L`).
    Long,
    /// 32-bit integer (`i`).
    Int,
    /// 32-bit float (`f`).
    Float,
    /// 64-bit float (`d`).
    Double,
    /// Single character (`c`); blank columns read as a space.
    Char,
    /// Trimmed text (no letter).
    Text,
}

impl TextKind {
    fn from_letter(letter: Option<char>) -> Option<Self> {
        match letter {
            None => Some(TextKind::Text),
            Some('L') => Some(TextKind::Long),
            Some('i') => Some(TextKind::Int),
            Some('f') => Some(TextKind::Float),
            Some('d') => Some(TextKind::Double),
            Some('c') => Some(TextKind::Char),
            Some(_) => None,
        }
    }

    /// Stored type of values of this kind.
    pub fn data_type(self) -> DataType {
        match self {
            TextKind::Long => DataType::Long,
            TextKind::Int => DataType::Int,
            TextKind::Float => DataType::Float,
            TextKind::Double => DataType::Double,
            TextKind::Char => DataType::Char,
            TextKind::Text => DataType::String,
        }
    }
}

/// Function computing a derived value from a parsed one.
pub type Transform = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

#[derive(Debug, Clone)]
struct ColumnField {
    name: String,
    kind: TextKind,
    start: usize,
    end: usize,
    repeat: Option<(usize, usize)>,
}

#[derive(Clone)]
struct DerivedField {
    name: String,
    source: usize,
    transform: Transform,
}

/// Column layout of one text line plus derived fields.
#[derive(Clone, Default)]
pub struct TextSchema {
    columns: Vec<ColumnField>,
    derived: Vec<DerivedField>,
}

impl fmt::Debug for TextSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSchema")
            .field("columns", &self.columns)
            .field(
                "derived",
                &self.derived.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TextSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a compact layout such as `"11L,15i,19"`, naming fields in order.
    pub fn from_format(format: &str, names: &[&str]) -> Result<Self> {
        let tokens: Vec<&str> = format.split(',').map(str::trim).collect();
        if tokens.len() != names.len() {
            return Err(CdmError::InvalidSchema(format!(
                "layout \"{}\" has {} columns but {} names were given",
                format,
                tokens.len(),
                names.len()
            )));
        }
        let mut schema = Self::new();
        let mut start = 0;
        for (token, name) in tokens.into_iter().zip(names) {
            let split = token
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(token.len());
            let (digits, rest) = token.split_at(split);
            let end: usize = digits.parse().map_err(|_| {
                CdmError::InvalidSchema(format!("bad column end in \"{}\"", token))
            })?;
            let mut letters = rest.chars();
            let kind = TextKind::from_letter(letters.next())
                .filter(|_| letters.next().is_none())
                .ok_or_else(|| CdmError::InvalidSchema(format!("bad type in \"{}\"", token)))?;
            schema = schema.column(*name, kind, start, end)?;
            start = end;
        }
        Ok(schema)
    }

    /// Add a field at character columns `start..end`.
    pub fn column(mut self, name: impl Into<String>, kind: TextKind, start: usize, end: usize) -> Result<Self> {
        let name = name.into();
        if end <= start {
            return Err(CdmError::InvalidSchema(format!(
                "field '{}' has empty column range {}..{}",
                name, start, end
            )));
        }
        self.check_new_name(&name)?;
        self.columns.push(ColumnField {
            name,
            kind,
            start,
            end,
            repeat: None,
        });
        Ok(self)
    }

    /// Make field `name` repeat `count` times, each copy `stride` columns after
    /// the previous. Repeated fields parse to arrays.
    pub fn repeat(mut self, name: &str, count: usize, stride: usize) -> Result<Self> {
        if count == 0 || stride == 0 {
            return Err(CdmError::InvalidSchema(format!(
                "field '{}' needs a positive repeat count and stride",
                name
            )));
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| CdmError::field_not_found(name))?;
        column.repeat = Some((count, stride));
        Ok(self)
    }

    /// Add a field computed from the parsed value of `source`.
    pub fn derived<F>(mut self, name: impl Into<String>, source: &str, transform: F) -> Result<Self>
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.check_new_name(&name)?;
        let source = self
            .columns
            .iter()
            .position(|c| c.name == source)
            .ok_or_else(|| CdmError::field_not_found(source))?;
        self.derived.push(DerivedField {
            name,
            source,
            transform: Arc::new(transform),
        });
        Ok(self)
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if self.index_of(name).is_some() {
            return Err(CdmError::InvalidSchema(format!("duplicate field '{}'", name)));
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.derived
                    .iter()
                    .position(|d| d.name == name)
                    .map(|i| i + self.columns.len())
            })
    }

    /// Field names: column fields first, then derived fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.derived.iter().map(|d| d.name.as_str()))
    }

    /// Parse one column field out of a line without building a full record.
    pub fn parse_field(&self, line: &str, name: &str) -> Result<Value> {
        let column = self
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CdmError::field_not_found(name))?;
        parse_column(column, line)
    }

    /// Parse a whole line.
    pub fn parse_line(self: &Arc<Self>, line: &str) -> Result<TextRecord> {
        let mut values = self
            .columns
            .iter()
            .map(|c| parse_column(c, line))
            .collect::<Result<Vec<_>>>()?;
        for d in &self.derived {
            let derived = (d.transform)(&values[d.source])?;
            values.push(derived);
        }
        Ok(TextRecord {
            schema: Arc::clone(self),
            values,
        })
    }
}

fn parse_column(column: &ColumnField, line: &str) -> Result<Value> {
    match column.repeat {
        None => parse_cell(column, line, column.start, column.end),
        Some((count, stride)) => (0..count)
            .map(|i| {
                let shift = i * stride;
                parse_cell(column, line, column.start + shift, column.end + shift)
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
    }
}

fn parse_cell(column: &ColumnField, line: &str, start: usize, end: usize) -> Result<Value> {
    let raw: String = line.chars().skip(start).take(end - start).collect();
    let text = raw.trim();
    let fail = || CdmError::parse(column.name.clone(), raw.clone());
    Ok(match column.kind {
        TextKind::Long => Value::Long(text.parse().map_err(|_| fail())?),
        TextKind::Int => Value::Int(text.parse().map_err(|_| fail())?),
        TextKind::Float => Value::Float(text.parse().map_err(|_| fail())?),
        TextKind::Double => Value::Double(text.parse().map_err(|_| fail())?),
        TextKind::Char => Value::Char(raw.chars().next().unwrap_or(' ')),
        TextKind::Text => Value::Text(text.to_string()),
    })
}

/// One parsed text line.
#[derive(Clone)]
pub struct TextRecord {
    schema: Arc<TextSchema>,
    values: Vec<Value>,
}

impl TextRecord {
    /// Value of a column or derived field.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.schema
            .index_of(name)
            .map(|i| &self.values[i])
            .ok_or_else(|| CdmError::field_not_found(name))
    }

    /// Field names and values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema.field_names().zip(self.values.iter())
    }

    /// Layout of this record.
    pub fn schema(&self) -> &Arc<TextSchema> {
        &self.schema
    }
}

impl fmt::Debug for TextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for TextRecord {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "101603550001932TAVG 1010  1  980  1-9999   ";

    fn schema() -> Arc<TextSchema> {
        let schema = TextSchema::from_format(
            "11L,15i,19,24i,25c,26c,27c",
            &["stnid", "year", "element", "value", "dm", "qc", "ds"],
        )
        .unwrap()
        .repeat("value", 3, 8)
        .unwrap()
        .repeat("qc", 3, 8)
        .unwrap()
        .derived("time", "year", |v| {
            let year = v.as_i64().ok_or_else(|| CdmError::parse("time", v.to_string()))?;
            Ok(Value::Text(format!("{}-01-01T00:00:00Z", year)))
        })
        .unwrap();
        Arc::new(schema)
    }

    #[test]
    fn test_parse_line() {
        let rec = schema().parse_line(LINE).unwrap();
        assert_eq!(rec.get("stnid").unwrap(), &Value::Long(10160355000));
        assert_eq!(rec.get("year").unwrap(), &Value::Int(1932));
        assert_eq!(rec.get("element").unwrap(), &Value::Text("TAVG".into()));
        assert_eq!(
            rec.get("value").unwrap(),
            &Value::Array(vec![Value::Int(1010), Value::Int(980), Value::Int(-9999)])
        );
        assert_eq!(rec.get("qc").unwrap().elements()[0], Value::Char(' '));
        assert_eq!(
            rec.get("time").unwrap(),
            &Value::Text("1932-01-01T00:00:00Z".into())
        );
        assert_eq!(rec.iter().count(), 8);
    }

    #[test]
    fn test_parse_single_field() {
        let id = schema().parse_field(LINE, "stnid").unwrap();
        assert_eq!(id, Value::Long(10160355000));
        assert!(schema().parse_field(LINE, "time").is_err());
    }

    #[test]
    fn test_bad_numeric_column() {
        let err = schema().parse_line("1016035500X1932TAVG").unwrap_err();
        assert!(matches!(err, CdmError::Parse { .. }));
    }

    #[test]
    fn test_bad_layouts() {
        assert!(TextSchema::from_format("11L,15x", &["a", "b"]).is_err());
        assert!(TextSchema::from_format("11L", &["a", "b"]).is_err());
        assert!(TextSchema::from_format("11L,5i", &["a", "b"]).is_err());
        assert!(TextSchema::from_format("11L,15i", &["a", "a"]).is_err());
        assert!(TextSchema::new().derived("d", "missing", |v| Ok(v.clone())).is_err());
    }
}
