use crate::{
    entities::{category, prelude::*, product_category},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Parent ids per `IN (...)` lookup; keeps SQLite under its bound-parameter limit.
const FRONTIER_CHUNK: usize = 500;

/// Input for creating a category
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// Breadth-first walk over the category forest.
///
/// Each round the caller resolves the children of [`DescendantWalk::frontier`]
/// and hands them to [`DescendantWalk::absorb`]. Ids already seen are dropped,
/// so the walk terminates even if the stored parent links contain a cycle.
#[derive(Debug)]
pub struct DescendantWalk {
    visited: HashSet<Uuid>,
    frontier: Vec<Uuid>,
}

impl DescendantWalk {
    pub fn new(root: Uuid) -> Self {
        Self {
            visited: HashSet::from([root]),
            frontier: vec![root],
        }
    }

    pub fn frontier(&self) -> &[Uuid] {
        &self.frontier
    }

    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Replaces the frontier with the not yet visited ids among `children`.
    pub fn absorb(&mut self, children: impl IntoIterator<Item = Uuid>) {
        let mut next = Vec::new();
        for child in children {
            if self.visited.insert(child) {
                next.push(child);
            }
        }
        self.frontier = next;
    }

    pub fn into_ids(self) -> HashSet<Uuid> {
        self.visited
    }
}

/// Descendant set of `root` (including `root`) over in-memory `(id, parent_id)` edges.
pub fn descendant_ids_in(root: Uuid, edges: &[(Uuid, Option<Uuid>)]) -> HashSet<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(*parent).or_default().push(*id);
        }
    }

    let mut walk = DescendantWalk::new(root);
    while !walk.is_done() {
        let next: Vec<Uuid> = walk
            .frontier()
            .iter()
            .filter_map(|id| children.get(id))
            .flatten()
            .copied()
            .collect();
        walk.absorb(next);
    }
    walk.into_ids()
}

/// Descendant set of `root` (including `root`), one query per tree level.
pub async fn descendant_ids<C: ConnectionTrait>(
    conn: &C,
    root: Uuid,
) -> Result<HashSet<Uuid>, DbErr> {
    let mut walk = DescendantWalk::new(root);
    while !walk.is_done() {
        let mut next = Vec::new();
        for chunk in walk.frontier().chunks(FRONTIER_CHUNK) {
            let children: Vec<Uuid> = Category::find()
                .select_only()
                .column(category::Column::Id)
                .filter(category::Column::ParentId.is_in(chunk.to_vec()))
                .into_tuple()
                .all(conn)
                .await?;
            next.extend(children);
        }
        walk.absorb(next);
    }
    Ok(walk.into_ids())
}

async fn find_category<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<category::Model, ServiceError> {
    Category::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Category", id))
}

/// Category tree operations: creation, navigation, re-parenting and deletion.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a category, optionally under an existing parent.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::NotFound)` - `parent_id` does not resolve
    /// * `Err(ServiceError::ValidationError)` - empty or overlong name
    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateCategoryInput) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db;

        if let Some(parent_id) = input.parent_id {
            find_category(db, parent_id).await?;
        }

        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            parent_id: Set(input.parent_id),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(category.id))
            .await;

        info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        find_category(&*self.db, id).await
    }

    /// All categories ordered by name.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Categories without a parent.
    #[instrument(skip(self))]
    pub async fn list_roots(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(Category::find()
            .filter(category::Column::ParentId.is_null())
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Direct children of `id`.
    #[instrument(skip(self))]
    pub async fn list_children(&self, id: Uuid) -> Result<Vec<category::Model>, ServiceError> {
        let db = &*self.db;
        find_category(db, id).await?;

        Ok(Category::find()
            .filter(category::Column::ParentId.eq(id))
            .order_by_asc(category::Column::Name)
            .all(db)
            .await?)
    }

    /// Breadcrumb for `id`: root first, `id` itself last.
    #[instrument(skip(self))]
    pub async fn get_ancestor_chain(&self, id: Uuid) -> Result<Vec<category::Model>, ServiceError> {
        let db = &*self.db;
        let mut current = find_category(db, id).await?;
        let mut seen = HashSet::from([current.id]);
        let mut chain = Vec::new();

        while let Some(parent_id) = current.parent_id {
            if !seen.insert(parent_id) {
                warn!(category_id = %id, %parent_id, "Cycle in category parent links");
                break;
            }
            let Some(parent) = Category::find_by_id(parent_id).one(db).await? else {
                break;
            };
            chain.push(std::mem::replace(&mut current, parent));
        }
        chain.push(current);
        chain.reverse();

        Ok(chain)
    }

    /// `id` plus every category below it at any depth.
    #[instrument(skip(self))]
    pub async fn get_descendant_ids(&self, id: Uuid) -> Result<HashSet<Uuid>, ServiceError> {
        let db = &*self.db;
        find_category(db, id).await?;
        Ok(descendant_ids(db, id).await?)
    }

    /// Re-parents `id` under `new_parent_id` (or makes it a root).
    ///
    /// Moving a category under itself or one of its descendants is rejected
    /// with `ValidationError`, keeping the forest acyclic.
    #[instrument(skip(self))]
    pub async fn move_category(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<category::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let category = find_category(&txn, id).await?;

        if let Some(parent_id) = new_parent_id {
            find_category(&txn, parent_id).await?;
            let subtree = descendant_ids(&txn, id).await?;
            if subtree.contains(&parent_id) {
                return Err(ServiceError::ValidationError(format!(
                    "Category {} cannot be moved under itself or its descendant {}",
                    id, parent_id
                )));
            }
        }

        let mut active: category::ActiveModel = category.into();
        active.parent_id = Set(new_parent_id);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(category_id = %id, parent_id = ?new_parent_id, "Moved category");
        Ok(updated)
    }

    /// Deletes a category.
    ///
    /// Direct children are re-parented to the deleted category's parent and
    /// its product associations are removed. Products themselves are kept.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let category = find_category(&txn, id).await?;

        let reparented = Category::update_many()
            .col_expr(category::Column::ParentId, Expr::value(category.parent_id))
            .filter(category::Column::ParentId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        ProductCategory::delete_many()
            .filter(product_category::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?;

        Category::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CategoryDeleted(id))
            .await;

        info!(category_id = %id, reparented, "Deleted category");
        Ok(())
    }
}
