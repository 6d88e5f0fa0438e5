#![forbid(unsafe_code)]

//! Filesystem hierarchy store: folders are branches, files are leaves, and a
//! file's text content rides in the content cache.

use arbor_core::{
    FieldType, NodeCodec, NodeFactory, NodeMeta, SchemaDescriptor, SchemaError, TreeNode,
    TreeSchema, Value,
};
use time::OffsetDateTime;

pub const FOLDER_KIND: &str = "folder";
pub const FILE_KIND: &str = "file";

#[derive(Clone, Debug, PartialEq)]
pub struct Folder {
    pub meta: NodeMeta,
    pub name: String,
}

impl Folder {
    pub fn new(name: impl Into<String>, parent: i64) -> Self {
        Self {
            meta: NodeMeta::under(parent),
            name: name.into(),
        }
    }
}

impl NodeCodec for Folder {
    fn kind(&self) -> &str {
        FOLDER_KIND
    }

    fn metadata(&self) -> NodeMeta {
        self.meta
    }

    fn set_metadata(&mut self, meta: NodeMeta) {
        self.meta = meta;
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub meta: NodeMeta,
    pub name: String,
    pub size: i64,
    pub modified: Option<OffsetDateTime>,
    pub hidden: bool,
    pub content: Option<String>,
}

impl File {
    pub fn new(name: impl Into<String>, size: i64, parent: i64) -> Self {
        Self {
            meta: NodeMeta::under(parent),
            name: name.into(),
            size,
            modified: None,
            hidden: false,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

impl NodeCodec for File {
    fn kind(&self) -> &str {
        FILE_KIND
    }

    fn metadata(&self) -> NodeMeta {
        self.meta
    }

    fn set_metadata(&mut self, meta: NodeMeta) {
        self.meta = meta;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.size.into(),
            self.modified.into(),
            self.hidden.into(),
        ]
    }

    fn extract_payload(&self) -> Option<String> {
        self.content.clone().filter(|content| !content.is_empty())
    }

    fn inject_payload(&mut self, payload: String) {
        self.content = Some(payload);
    }
}

pub type FileNode = TreeNode<Folder, File>;

#[derive(Debug)]
pub struct FileTree {
    name: String,
    folder_schema: SchemaDescriptor,
    file_schema: SchemaDescriptor,
    folders: NodeFactory<Folder>,
    files: NodeFactory<File>,
}

impl FileTree {
    pub fn new(name: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        arbor_core::validate_identifier(&name)?;

        let folders = NodeFactory::new().register(FOLDER_KIND, |meta, row| {
            Ok(Folder {
                meta,
                name: row.text()?.unwrap_or_default(),
            })
        });
        let files = NodeFactory::new().register(FILE_KIND, |meta, row| {
            Ok(File {
                meta,
                name: row.text()?.unwrap_or_default(),
                size: row.integer()?.unwrap_or_default(),
                modified: row.timestamp()?,
                hidden: row.boolean()?.unwrap_or(false),
                content: None,
            })
        });

        Ok(Self {
            name,
            folder_schema: SchemaDescriptor::try_new(&[("name", FieldType::String)])?,
            file_schema: SchemaDescriptor::try_new(&[
                ("name", FieldType::String),
                ("size", FieldType::Integer),
                ("modified", FieldType::Timestamp),
                ("hidden", FieldType::Boolean),
            ])?,
            folders,
            files,
        })
    }
}

impl TreeSchema for FileTree {
    type Branch = Folder;
    type Leaf = File;

    fn name(&self) -> &str {
        &self.name
    }

    fn branch_schema(&self) -> &SchemaDescriptor {
        &self.folder_schema
    }

    fn leaf_schema(&self) -> &SchemaDescriptor {
        &self.file_schema
    }

    fn branch_factory(&self) -> &NodeFactory<Folder> {
        &self.folders
    }

    fn leaf_factory(&self) -> &NodeFactory<File> {
        &self.files
    }
}
