//! Row type flowing through the pipeline.

/// One row of the stream: an ordered sequence of text fields.
///
/// Width is not fixed across a run. There are no mutating accessors; a stage
/// that rewrites a row builds a new `Record`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Record { fields }
    }

    /// Build a record from string slices.
    pub fn from_strs(fields: &[&str]) -> Self {
        Record {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at `index`, or `None` past the end of the row.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

impl From<csv::StringRecord> for Record {
    fn from(row: csv::StringRecord) -> Self {
        Record {
            fields: row.iter().map(str::to_owned).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_access() {
        let r = Record::from_strs(&["a", "b", "c"]);
        assert_eq!(r.width(), 3);
        assert_eq!(r.field(1), Some("b"));
        assert_eq!(r.field(3), None);
    }

    #[test]
    fn test_from_string_record() {
        let row = csv::StringRecord::from(vec!["x", "", "z"]);
        let r = Record::from(row);
        assert_eq!(r, Record::from_strs(&["x", "", "z"]));
    }
}
