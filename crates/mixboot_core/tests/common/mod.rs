//! Fixture builders shared by integration tests.
//!
//! Produces small but valid class files carrying annotation tables, and
//! writes them into archives laid out like installed units.

#![allow(dead_code)]

use mixboot_core::discovery::markers::{
    COMPAT_CONTAINER_MARKER, COMPAT_MARKER, CONFIG_NAME_MARKER, TOGGLE_CLASS_MARKER,
    TOGGLE_MARKER, UNIT_MARKER,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Bool(bool),
    Nested(AnnotationSpec),
    Array(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    descriptor: String,
    elements: Vec<(String, Value)>,
}

impl AnnotationSpec {
    pub fn new(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn str(mut self, name: &str, value: &str) -> Self {
        self.elements
            .push((name.to_string(), Value::Str(value.to_string())));
        self
    }

    pub fn bool(mut self, name: &str, value: bool) -> Self {
        self.elements.push((name.to_string(), Value::Bool(value)));
        self
    }

    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.elements.push((name.to_string(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    descriptor: String,
    annotations: Vec<AnnotationSpec>,
}

impl FieldSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: String,
    annotations: Vec<AnnotationSpec>,
    fields: Vec<FieldSpec>,
}

impl ClassSpec {
    pub fn new(internal_name: &str) -> Self {
        Self {
            name: internal_name.to_string(),
            annotations: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Encodes a Java 8 class file with no methods.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = PoolBuilder::default();
        let mut body = Vec::new();

        put_u2(&mut body, 0x0021);
        let this_class = pool.class(&self.name);
        put_u2(&mut body, this_class);
        let super_class = pool.class("java/lang/Object");
        put_u2(&mut body, super_class);
        put_u2(&mut body, 0);

        put_u2(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            put_u2(&mut body, 0x0009);
            let name = pool.utf8(&field.name);
            put_u2(&mut body, name);
            let descriptor = pool.utf8(&field.descriptor);
            put_u2(&mut body, descriptor);
            write_annotation_attributes(&mut body, &mut pool, &field.annotations);
        }

        put_u2(&mut body, 0);
        write_annotation_attributes(&mut body, &mut pool, &self.annotations);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        put_u2(&mut bytes, 0);
        put_u2(&mut bytes, 52);
        put_u2(&mut bytes, pool.next_index);
        bytes.extend_from_slice(&pool.bytes);
        bytes.extend_from_slice(&body);
        bytes
    }
}

struct PoolBuilder {
    bytes: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    integers: HashMap<i32, u16>,
    classes: HashMap<String, u16>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next_index: 1,
            utf8: HashMap::new(),
            integers: HashMap::new(),
            classes: HashMap::new(),
        }
    }
}

impl PoolBuilder {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        self.bytes.push(1);
        put_u2(&mut self.bytes, value.len() as u16);
        self.bytes.extend_from_slice(value.as_bytes());
        let index = self.bump();
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn integer(&mut self, value: i32) -> u16 {
        if let Some(index) = self.integers.get(&value) {
            return *index;
        }
        self.bytes.push(3);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        let index = self.bump();
        self.integers.insert(value, index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        self.bytes.push(7);
        put_u2(&mut self.bytes, name_index);
        let index = self.bump();
        self.classes.insert(name.to_string(), index);
        index
    }

    fn bump(&mut self) -> u16 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_annotation_attributes(
    out: &mut Vec<u8>,
    pool: &mut PoolBuilder,
    annotations: &[AnnotationSpec],
) {
    if annotations.is_empty() {
        put_u2(out, 0);
        return;
    }
    let mut table = Vec::new();
    put_u2(&mut table, annotations.len() as u16);
    for annotation in annotations {
        write_annotation(&mut table, pool, annotation);
    }
    put_u2(out, 1);
    let name = pool.utf8("RuntimeVisibleAnnotations");
    put_u2(out, name);
    out.extend_from_slice(&(table.len() as u32).to_be_bytes());
    out.extend_from_slice(&table);
}

fn write_annotation(out: &mut Vec<u8>, pool: &mut PoolBuilder, annotation: &AnnotationSpec) {
    let descriptor = pool.utf8(&annotation.descriptor);
    put_u2(out, descriptor);
    put_u2(out, annotation.elements.len() as u16);
    for (name, value) in &annotation.elements {
        let name = pool.utf8(name);
        put_u2(out, name);
        write_value(out, pool, value);
    }
}

fn write_value(out: &mut Vec<u8>, pool: &mut PoolBuilder, value: &Value) {
    match value {
        Value::Str(text) => {
            out.push(b's');
            let index = pool.utf8(text);
            put_u2(out, index);
        }
        Value::Bool(flag) => {
            out.push(b'Z');
            let index = pool.integer(i32::from(*flag));
            put_u2(out, index);
        }
        Value::Nested(annotation) => {
            out.push(b'@');
            write_annotation(out, pool, annotation);
        }
        Value::Array(items) => {
            out.push(b'[');
            put_u2(out, items.len() as u16);
            for item in items {
                write_value(out, pool, item);
            }
        }
    }
}

/// Class declaring an extension unit.
pub fn unit_class(internal_name: &str, unit_id: &str) -> Vec<u8> {
    ClassSpec::new(internal_name)
        .annotated(AnnotationSpec::new(UNIT_MARKER).str("modid", unit_id))
        .to_bytes()
}

/// One declared patch toggle.
#[derive(Debug, Clone)]
pub struct ToggleSpec {
    pub field: String,
    pub early: Option<String>,
    pub late: Option<String>,
    pub default_value: bool,
    pub compat: Vec<AnnotationSpec>,
}

impl ToggleSpec {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            early: None,
            late: None,
            default_value: false,
            compat: Vec::new(),
        }
    }

    pub fn early(mut self, resource: &str) -> Self {
        self.early = Some(resource.to_string());
        self
    }

    pub fn late(mut self, resource: &str) -> Self {
        self.late = Some(resource.to_string());
        self
    }

    pub fn enabled_by_default(mut self) -> Self {
        self.default_value = true;
        self
    }

    /// Constraint on `unit_id`; absent keys keep their declared defaults.
    pub fn requires(mut self, unit_id: &str, desired: bool, disable: bool, reason: &str) -> Self {
        self.compat.push(
            AnnotationSpec::new(COMPAT_MARKER)
                .str("modid", unit_id)
                .bool("desired", desired)
                .bool("disableMixin", disable)
                .str("reason", reason),
        );
        self
    }
}

/// Class grouping toggles under `settings_unit`. Constraints on a toggle
/// with more than one entry are wrapped in the repeatable container.
pub fn toggle_class(internal_name: &str, settings_unit: &str, toggles: &[ToggleSpec]) -> Vec<u8> {
    let mut class = ClassSpec::new(internal_name)
        .annotated(AnnotationSpec::new(TOGGLE_CLASS_MARKER).str("name", settings_unit));

    for (index, toggle) in toggles.iter().enumerate() {
        let mut marker = AnnotationSpec::new(TOGGLE_MARKER);
        if let Some(early) = &toggle.early {
            marker = marker.str("earlyMixin", early);
        }
        if let Some(late) = &toggle.late {
            marker = marker.str("lateMixin", late);
        }
        if toggle.default_value {
            marker = marker.bool("defaultValue", true);
        }

        let mut field = FieldSpec::new(&format!("toggle{index}"), "Z")
            .annotated(AnnotationSpec::new(CONFIG_NAME_MARKER).str("value", &toggle.field))
            .annotated(marker);
        match toggle.compat.len() {
            0 => {}
            1 => field = field.annotated(toggle.compat[0].clone()),
            _ => {
                let nested = toggle.compat.iter().cloned().map(Value::Nested).collect();
                field = field.annotated(
                    AnnotationSpec::new(COMPAT_CONTAINER_MARKER).value("value", Value::Array(nested)),
                );
            }
        }
        class = class.field(field);
    }
    class.to_bytes()
}

/// Writes a stored (uncompressed) archive with `entries`.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("archive parent dir");
    }
    let file = File::create(path).expect("create archive");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start archive entry");
        writer.write_all(bytes).expect("write archive entry");
    }
    writer.finish().expect("finish archive");
}

/// Writes a one-entry stored archive by hand whose zip64 extra field claims
/// an uncompressed size of `claimed_size`. The CRC is left at zero.
pub fn write_jar_with_claimed_size(path: &Path, name: &str, data: &[u8], claimed_size: u64) {
    const DOS_DATE_1980_01_01: u16 = 0x21;
    let mut zip64_extra = Vec::new();
    put_le2(&mut zip64_extra, 0x0001);
    put_le2(&mut zip64_extra, 8);
    zip64_extra.extend_from_slice(&claimed_size.to_le_bytes());

    let mut out = Vec::new();
    put_le4(&mut out, 0x0403_4b50);
    put_le2(&mut out, 45);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, DOS_DATE_1980_01_01);
    put_le4(&mut out, 0);
    put_le4(&mut out, data.len() as u32);
    put_le4(&mut out, u32::MAX);
    put_le2(&mut out, name.len() as u16);
    put_le2(&mut out, zip64_extra.len() as u16);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&zip64_extra);
    out.extend_from_slice(data);

    let central_start = out.len() as u32;
    put_le4(&mut out, 0x0201_4b50);
    put_le2(&mut out, 45);
    put_le2(&mut out, 45);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, DOS_DATE_1980_01_01);
    put_le4(&mut out, 0);
    put_le4(&mut out, data.len() as u32);
    put_le4(&mut out, u32::MAX);
    put_le2(&mut out, name.len() as u16);
    put_le2(&mut out, zip64_extra.len() as u16);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le4(&mut out, 0);
    put_le4(&mut out, 0);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&zip64_extra);
    let central_len = out.len() as u32 - central_start;

    put_le4(&mut out, 0x0605_4b50);
    put_le2(&mut out, 0);
    put_le2(&mut out, 0);
    put_le2(&mut out, 1);
    put_le2(&mut out, 1);
    put_le4(&mut out, central_len);
    put_le4(&mut out, central_start);
    put_le2(&mut out, 0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("archive parent dir");
    }
    std::fs::write(path, out).expect("write hand-built archive");
}

fn put_le2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_le4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Writes `<game_dir>/config/<unit>.cfg`.
pub fn write_settings(game_dir: &Path, unit: &str, body: &str) {
    let dir = game_dir.join("config");
    std::fs::create_dir_all(&dir).expect("settings dir");
    std::fs::write(dir.join(format!("{unit}.cfg")), body).expect("write settings");
}
