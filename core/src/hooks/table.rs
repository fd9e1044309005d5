//! Static operation table: which category each driver operation belongs to
//! and what its hooks receive before and after it runs.

use std::fmt;

/// Driver operations that can carry hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// `find`
    Find,
    /// `findOne`
    FindOne,
    /// `countDocuments`
    CountDocuments,
    /// `estimatedDocumentCount`
    EstimatedDocumentCount,
    /// `distinct`
    Distinct,
    /// `aggregate`
    Aggregate,
    /// `save`
    Save,
    /// `insertMany`
    InsertMany,
    /// `updateOne`
    UpdateOne,
    /// `updateMany`
    UpdateMany,
    /// `replaceOne`
    ReplaceOne,
    /// `findOneAndUpdate`
    FindOneAndUpdate,
    /// `findOneAndReplace`
    FindOneAndReplace,
    /// `deleteOne`
    DeleteOne,
    /// `deleteMany`
    DeleteMany,
    /// `findOneAndDelete`
    FindOneAndDelete,
}

/// Normalized operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookCategory {
    /// Queries and aggregations.
    Read,
    /// Inserts, saves, updates and replacements.
    Write,
    /// Deletions.
    Delete,
}

/// Before or after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Before the operation runs.
    Pre,
    /// After the operation completed.
    Post,
}

/// What a hook receives as its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The query (filter, update, pipeline).
    Query,
    /// The document(s) being written.
    Document,
    /// The operation's result.
    Result,
}

/// Table row for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// Category.
    pub category: HookCategory,
    /// Payload of pre hooks.
    pub pre: Binding,
    /// Payload of post hooks.
    pub post: Binding,
}

impl Operation {
    /// Every operation, in table order.
    pub const ALL: [Operation; 16] = [
        Operation::Find,
        Operation::FindOne,
        Operation::CountDocuments,
        Operation::EstimatedDocumentCount,
        Operation::Distinct,
        Operation::Aggregate,
        Operation::Save,
        Operation::InsertMany,
        Operation::UpdateOne,
        Operation::UpdateMany,
        Operation::ReplaceOne,
        Operation::FindOneAndUpdate,
        Operation::FindOneAndReplace,
        Operation::DeleteOne,
        Operation::DeleteMany,
        Operation::FindOneAndDelete,
    ];

    /// The table row.
    pub fn spec(&self) -> OperationSpec {
        use Binding::*;
        use HookCategory::*;
        let (category, pre, post) = match self {
            Operation::Find
            | Operation::FindOne
            | Operation::CountDocuments
            | Operation::EstimatedDocumentCount
            | Operation::Distinct
            | Operation::Aggregate => (Read, Query, Result),
            Operation::Save => (Write, Document, Document),
            Operation::InsertMany => (Write, Document, Result),
            Operation::UpdateOne
            | Operation::UpdateMany
            | Operation::ReplaceOne
            | Operation::FindOneAndUpdate
            | Operation::FindOneAndReplace => (Write, Query, Result),
            Operation::DeleteOne | Operation::DeleteMany | Operation::FindOneAndDelete => {
                (Delete, Query, Result)
            }
        };
        OperationSpec {
            category,
            pre,
            post,
        }
    }

    /// Category of the operation.
    pub fn category(&self) -> HookCategory {
        self.spec().category
    }

    /// Payload at a stage.
    pub fn binding(&self, stage: Stage) -> Binding {
        match stage {
            Stage::Pre => self.spec().pre,
            Stage::Post => self.spec().post,
        }
    }

    /// Driver-side name.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::CountDocuments => "countDocuments",
            Operation::EstimatedDocumentCount => "estimatedDocumentCount",
            Operation::Distinct => "distinct",
            Operation::Aggregate => "aggregate",
            Operation::Save => "save",
            Operation::InsertMany => "insertMany",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::ReplaceOne => "replaceOne",
            Operation::FindOneAndUpdate => "findOneAndUpdate",
            Operation::FindOneAndReplace => "findOneAndReplace",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
            Operation::FindOneAndDelete => "findOneAndDelete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations of a category, in table order.
pub fn operations_for(category: HookCategory) -> Vec<Operation> {
    Operation::ALL
        .into_iter()
        .filter(|op| op.category() == category)
        .collect()
}
