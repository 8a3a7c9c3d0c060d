//! Structural reader for compiled class files.
//!
//! # Responsibility
//! - Decode the constant pool, field table and class-level annotations of a
//!   class file without linking or executing anything.
//! - Keep field attributes raw so field annotations are decoded only when a
//!   caller asks for them.
//!
//! # Invariants
//! - Every read is bounds-checked; malformed input yields `ClassFileError`,
//!   never a panic.
//! - Method bodies are skipped by length, never interpreted.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CLASS_MAGIC: u32 = 0xCAFE_BABE;
const MAX_ANNOTATION_DEPTH: usize = 32;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// Structural parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    Truncated { offset: usize, wanted: usize },
    BadMagic(u32),
    UnknownConstantTag { tag: u8, index: u16 },
    BadConstantIndex(u16),
    UnexpectedConstant { index: u16, expected: &'static str },
    UnknownElementTag(u8),
    AnnotationTooDeep,
}

impl Display for ClassFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { offset, wanted } => {
                write!(f, "class file truncated at offset {offset} (wanted {wanted} bytes)")
            }
            Self::BadMagic(value) => write!(f, "not a class file (magic {value:#010x})"),
            Self::UnknownConstantTag { tag, index } => {
                write!(f, "unknown constant pool tag {tag} at index {index}")
            }
            Self::BadConstantIndex(index) => write!(f, "constant pool index {index} out of range"),
            Self::UnexpectedConstant { index, expected } => {
                write!(f, "constant pool index {index} is not a {expected} entry")
            }
            Self::UnknownElementTag(tag) => {
                write!(f, "unknown annotation element tag {:?}", char::from(*tag))
            }
            Self::AnnotationTooDeep => write!(f, "annotation nesting exceeds {MAX_ANNOTATION_DEPTH}"),
        }
    }
}

impl Error for ClassFileError {}

pub type ClassFileResult<T> = Result<T, ClassFileError>;

#[derive(Debug, Clone, PartialEq)]
enum Constant {
    /// Index 0 and the upper half of long/double entries.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Other,
}

/// Decoded constant pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn get(&self, index: u16) -> ClassFileResult<&Constant> {
        self.entries
            .get(usize::from(index))
            .filter(|_| index != 0)
            .ok_or(ClassFileError::BadConstantIndex(index))
    }

    pub fn utf8(&self, index: u16) -> ClassFileResult<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn class_name(&self, index: u16) -> ClassFileResult<&str> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Class",
            }),
        }
    }

    fn integer(&self, index: u16) -> ClassFileResult<i32> {
        match self.get(index)? {
            Constant::Integer(value) => Ok(*value),
            _ => Err(ClassFileError::UnexpectedConstant {
                index,
                expected: "Integer",
            }),
        }
    }
}

/// Annotation element value.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// `B`, `C`, `I`, `S` and `Z` constants.
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Enum { type_descriptor: String, constant: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Boolean elements are stored as integer constants.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Int(value) => Some(*value != 0),
            _ => None,
        }
    }
}

/// One annotation occurrence with its explicitly written elements.
///
/// Elements left at their declared default are absent from class files.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_descriptor: String,
    pub elements: BTreeMap<String, ElementValue>,
}

impl Annotation {
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.element(name).and_then(ElementValue::as_str)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.element(name).and_then(ElementValue::as_bool)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RawAttribute {
    name: String,
    bytes: Vec<u8>,
}

/// Field table entry; annotations decoded on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    attributes: Vec<RawAttribute>,
}

impl FieldInfo {
    pub fn is_boolean(&self) -> bool {
        self.descriptor == "Z"
    }

    /// Decodes runtime visible and invisible annotations on this field.
    pub fn annotations(&self, pool: &ConstantPool) -> ClassFileResult<Vec<Annotation>> {
        decode_annotation_attributes(&self.attributes, pool)
    }
}

/// Structural view of one class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub major_version: u16,
    pub this_class: String,
    pub constant_pool: ConstantPool,
    pub fields: Vec<FieldInfo>,
    pub annotations: Vec<Annotation>,
}

impl ClassFile {
    /// Parses one class file from raw bytes.
    pub fn parse(bytes: &[u8]) -> ClassFileResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.u4()?;
        if magic != CLASS_MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let _minor = reader.u2()?;
        let major_version = reader.u2()?;
        let constant_pool = read_constant_pool(&mut reader)?;

        let _access = reader.u2()?;
        let this_class = constant_pool.class_name(reader.u2()?)?.to_string();
        let _super_class = reader.u2()?;
        let interface_count = reader.u2()?;
        reader.skip(usize::from(interface_count) * 2)?;

        let field_count = reader.u2()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            let access_flags = reader.u2()?;
            let name = constant_pool.utf8(reader.u2()?)?.to_string();
            let descriptor = constant_pool.utf8(reader.u2()?)?.to_string();
            let attributes = read_attributes(&mut reader, &constant_pool)?;
            fields.push(FieldInfo {
                access_flags,
                name,
                descriptor,
                attributes,
            });
        }

        let method_count = reader.u2()?;
        for _ in 0..method_count {
            reader.skip(6)?;
            skip_attributes(&mut reader)?;
        }

        let class_attributes = read_attributes(&mut reader, &constant_pool)?;
        let annotations = decode_annotation_attributes(&class_attributes, &constant_pool)?;

        Ok(Self {
            major_version,
            this_class,
            constant_pool,
            fields,
            annotations,
        })
    }
}

fn read_constant_pool(reader: &mut ByteReader<'_>) -> ClassFileResult<ConstantPool> {
    let count = reader.u2()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    entries.push(Constant::Unusable);

    let mut index: u16 = 1;
    while index < count {
        let tag = reader.u1()?;
        let (constant, slots) = match tag {
            1 => {
                let length = reader.u2()?;
                let bytes = reader.take(usize::from(length))?;
                (Constant::Utf8(decode_modified_utf8(bytes)), 1)
            }
            3 => (Constant::Integer(reader.u4()? as i32), 1),
            4 => (Constant::Float(f32::from_bits(reader.u4()?)), 1),
            5 => (Constant::Long(reader.u8()? as i64), 2),
            6 => (Constant::Double(f64::from_bits(reader.u8()?)), 2),
            7 => (Constant::Class(reader.u2()?), 1),
            // String, MethodType, Module, Package
            8 | 16 | 19 | 20 => {
                reader.skip(2)?;
                (Constant::Other, 1)
            }
            // Field/Method/InterfaceMethod refs, NameAndType, Dynamic, InvokeDynamic
            9 | 10 | 11 | 12 | 17 | 18 => {
                reader.skip(4)?;
                (Constant::Other, 1)
            }
            15 => {
                reader.skip(3)?;
                (Constant::Other, 1)
            }
            other => return Err(ClassFileError::UnknownConstantTag { tag: other, index }),
        };
        entries.push(constant);
        if slots == 2 {
            entries.push(Constant::Unusable);
        }
        index = index.saturating_add(slots);
    }

    Ok(ConstantPool { entries })
}

fn read_attributes(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> ClassFileResult<Vec<RawAttribute>> {
    let count = reader.u2()?;
    let mut attributes = Vec::new();
    for _ in 0..count {
        let name_index = reader.u2()?;
        let length = reader.u4()? as usize;
        let bytes = reader.take(length)?;
        let name = pool.utf8(name_index)?;
        // Only annotation tables are ever consulted.
        if name == RUNTIME_VISIBLE_ANNOTATIONS || name == RUNTIME_INVISIBLE_ANNOTATIONS {
            attributes.push(RawAttribute {
                name: name.to_string(),
                bytes: bytes.to_vec(),
            });
        }
    }
    Ok(attributes)
}

fn skip_attributes(reader: &mut ByteReader<'_>) -> ClassFileResult<()> {
    let count = reader.u2()?;
    for _ in 0..count {
        reader.skip(2)?;
        let length = reader.u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

fn decode_annotation_attributes(
    attributes: &[RawAttribute],
    pool: &ConstantPool,
) -> ClassFileResult<Vec<Annotation>> {
    let mut annotations = Vec::new();
    for attribute in attributes {
        debug_assert!(
            attribute.name == RUNTIME_VISIBLE_ANNOTATIONS
                || attribute.name == RUNTIME_INVISIBLE_ANNOTATIONS
        );
        let mut reader = ByteReader::new(&attribute.bytes);
        let count = reader.u2()?;
        for _ in 0..count {
            annotations.push(read_annotation(&mut reader, pool, 0)?);
        }
    }
    Ok(annotations)
}

fn read_annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> ClassFileResult<Annotation> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(ClassFileError::AnnotationTooDeep);
    }
    let type_descriptor = pool.utf8(reader.u2()?)?.to_string();
    let pair_count = reader.u2()?;
    let mut elements = BTreeMap::new();
    for _ in 0..pair_count {
        let name = pool.utf8(reader.u2()?)?.to_string();
        let value = read_element_value(reader, pool, depth + 1)?;
        elements.insert(name, value);
    }
    Ok(Annotation {
        type_descriptor,
        elements,
    })
}

fn read_element_value(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> ClassFileResult<ElementValue> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(ClassFileError::AnnotationTooDeep);
    }
    let tag = reader.u1()?;
    let value = match tag {
        b'B' | b'C' | b'I' | b'S' | b'Z' => ElementValue::Int(pool.integer(reader.u2()?)?),
        b'J' => {
            let index = reader.u2()?;
            match pool.get(index)? {
                Constant::Long(value) => ElementValue::Long(*value),
                _ => {
                    return Err(ClassFileError::UnexpectedConstant {
                        index,
                        expected: "Long",
                    })
                }
            }
        }
        b'F' => {
            let index = reader.u2()?;
            match pool.get(index)? {
                Constant::Float(value) => ElementValue::Float(*value),
                _ => {
                    return Err(ClassFileError::UnexpectedConstant {
                        index,
                        expected: "Float",
                    })
                }
            }
        }
        b'D' => {
            let index = reader.u2()?;
            match pool.get(index)? {
                Constant::Double(value) => ElementValue::Double(*value),
                _ => {
                    return Err(ClassFileError::UnexpectedConstant {
                        index,
                        expected: "Double",
                    })
                }
            }
        }
        b's' => ElementValue::Str(pool.utf8(reader.u2()?)?.to_string()),
        b'e' => {
            let type_descriptor = pool.utf8(reader.u2()?)?.to_string();
            let constant = pool.utf8(reader.u2()?)?.to_string();
            ElementValue::Enum {
                type_descriptor,
                constant,
            }
        }
        b'c' => ElementValue::Class(pool.utf8(reader.u2()?)?.to_string()),
        b'@' => ElementValue::Annotation(read_annotation(reader, pool, depth)?),
        b'[' => {
            let count = reader.u2()?;
            let mut values = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                values.push(read_element_value(reader, pool, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => return Err(ClassFileError::UnknownElementTag(other)),
    };
    Ok(value)
}

/// Decodes the JVM's modified UTF-8 (CESU-8 surrogates, two-byte NUL).
fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(value) = std::str::from_utf8(bytes) {
        return value.to_string();
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push((u16::from(b & 0x1F) << 6) | u16::from(bytes[i + 1] & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            units.push(
                (u16::from(b & 0x0F) << 12)
                    | (u16::from(bytes[i + 1] & 0x3F) << 6)
                    | u16::from(bytes[i + 2] & 0x3F),
            );
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> ClassFileResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated {
                offset: self.offset,
                wanted: len,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> ClassFileResult<()> {
        self.take(len).map(|_| ())
    }

    fn u1(&mut self) -> ClassFileResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> ClassFileResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u4(&mut self) -> ClassFileResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u8(&mut self) -> ClassFileResult<u64> {
        let high = u64::from(self.u4()?);
        let low = u64::from(self.u4()?);
        Ok((high << 32) | low)
    }
}
