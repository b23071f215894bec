//! Parquet-family schema model: primitive types, repetitions, logical
//! annotations, fields, and the message type they compose into.

use jparque_result::{Error, Result};
use std::fmt;

/// Primitive column types. Tag values match the Parquet type family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    Binary,
    FixedLenByteArray,
}

impl PhysicalType {
    pub fn value(self) -> i32 {
        match self {
            PhysicalType::Boolean => 0,
            PhysicalType::Int32 => 1,
            PhysicalType::Int64 => 2,
            PhysicalType::Int96 => 3,
            PhysicalType::Float => 4,
            PhysicalType::Double => 5,
            PhysicalType::Binary => 6,
            PhysicalType::FixedLenByteArray => 7,
        }
    }

    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => PhysicalType::Boolean,
            1 => PhysicalType::Int32,
            2 => PhysicalType::Int64,
            3 => PhysicalType::Int96,
            4 => PhysicalType::Float,
            5 => PhysicalType::Double,
            6 => PhysicalType::Binary,
            7 => PhysicalType::FixedLenByteArray,
            other => return Err(Error::corrupt(format!("unknown type tag {other}"))),
        })
    }
}

/// How often a field may appear in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    /// Exactly once.
    Required,
    /// Zero or one times.
    Optional,
    /// Zero or more times.
    Repeated,
}

impl Repetition {
    pub fn value(self) -> i32 {
        match self {
            Repetition::Required => 0,
            Repetition::Optional => 1,
            Repetition::Repeated => 2,
        }
    }

    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Repetition::Required,
            1 => Repetition::Optional,
            2 => Repetition::Repeated,
            other => return Err(Error::corrupt(format!("unknown repetition tag {other}"))),
        })
    }
}

/// Semantic annotation layered over a primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Utf8,
    Map,
    List,
    Decimal,
    Date,
    TimeMillis,
    TimestampMillis,
    Interval,
}

impl LogicalType {
    pub fn value(self) -> i32 {
        match self {
            LogicalType::Utf8 => 0,
            LogicalType::Map => 1,
            LogicalType::List => 2,
            LogicalType::Decimal => 3,
            LogicalType::Date => 4,
            LogicalType::TimeMillis => 5,
            LogicalType::TimestampMillis => 6,
            LogicalType::Interval => 7,
        }
    }

    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            0 => LogicalType::Utf8,
            1 => LogicalType::Map,
            2 => LogicalType::List,
            3 => LogicalType::Decimal,
            4 => LogicalType::Date,
            5 => LogicalType::TimeMillis,
            6 => LogicalType::TimestampMillis,
            7 => LogicalType::Interval,
            other => return Err(Error::corrupt(format!("unknown logical type tag {other}"))),
        })
    }
}

/// One named column of a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub physical_type: PhysicalType,
    pub repetition: Repetition,
    pub logical_type: Option<LogicalType>,
    pub id: i32,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        physical_type: PhysicalType,
        repetition: Repetition,
    ) -> Self {
        Self {
            name: name.into(),
            physical_type,
            repetition,
            logical_type: None,
            id: -1,
        }
    }

    pub fn annotated(
        name: impl Into<String>,
        physical_type: PhysicalType,
        repetition: Repetition,
        logical_type: LogicalType,
    ) -> Self {
        Self {
            logical_type: Some(logical_type),
            ..Self::new(name, physical_type, repetition)
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {}",
            match self.repetition {
                Repetition::Required => "required",
                Repetition::Optional => "optional",
                Repetition::Repeated => "repeated",
            },
            self.physical_type,
            self.name
        )?;
        if let Some(lt) = self.logical_type {
            write!(f, " ({lt:?})")?;
        }
        Ok(())
    }
}

/// The root of a schema: a named, ordered list of fields with a version
/// counter and an optional link to the version it replaced. No migration
/// logic hangs off the link; it is annotation only.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    name: String,
    fields: Vec<Field>,
    version: u32,
    previous_version: Option<Box<MessageType>>,
}

impl MessageType {
    pub fn builder(name: impl Into<String>) -> MessageTypeBuilder {
        MessageTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
            version: 1,
            previous_version: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn previous_version(&self) -> Option<&MessageType> {
        self.previous_version.as_deref()
    }

    /// A copy of this message type with one field appended. Used by the
    /// column store to add its internal key column.
    pub fn with_field(&self, field: Field) -> Result<MessageType> {
        if self.field(&field.name).is_some() {
            return Err(Error::invalid(format!(
                "schema '{}' already has a field named '{}'",
                self.name, field.name
            )));
        }
        let mut fields = self.fields.clone();
        fields.push(field);
        Ok(MessageType {
            name: self.name.clone(),
            fields,
            version: self.version,
            previous_version: self.previous_version.clone(),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "message {} {{", self.name)?;
        for field in &self.fields {
            writeln!(f, "  {field};")?;
        }
        write!(f, "}}")
    }
}

/// Builder for [`MessageType`].
pub struct MessageTypeBuilder {
    name: String,
    fields: Vec<Field>,
    version: u32,
    previous_version: Option<Box<MessageType>>,
}

impl MessageTypeBuilder {
    pub fn field(
        mut self,
        name: impl Into<String>,
        physical_type: PhysicalType,
        repetition: Repetition,
    ) -> Self {
        self.fields.push(Field::new(name, physical_type, repetition));
        self
    }

    pub fn annotated_field(
        mut self,
        name: impl Into<String>,
        physical_type: PhysicalType,
        repetition: Repetition,
        logical_type: LogicalType,
    ) -> Self {
        self.fields
            .push(Field::annotated(name, physical_type, repetition, logical_type));
        self
    }

    pub fn add(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Mark this schema as the successor of `previous`; the version
    /// counter advances past it.
    pub fn previous_version(mut self, previous: MessageType) -> Self {
        self.version = previous.version() + 1;
        self.previous_version = Some(Box::new(previous));
        self
    }

    pub fn build(self) -> MessageType {
        MessageType {
            name: self.name,
            fields: self.fields,
            version: self.version,
            previous_version: self.previous_version,
        }
    }
}
