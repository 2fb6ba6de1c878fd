//! # Store
//!
//! ORM operations over any [`KgApi`]: listing, counting and fetching
//! objects, resolving proxies and queries, existence checks, saving
//! (recursively), deleting and releasing.
//!
//! A `Store` owns its [`IdentityCache`] and [`ActivityLog`]. Both sit behind
//! `tokio::sync::Mutex` so the store can be shared by reference across tasks.
//! Locks are never held across a request to the KG.

use crate::client::{KgApi, QueryParams};
use crate::error::OrmError;
use kgorm_core::primitives::{DEFAULT_PAGE_SIZE, ID_PARAMETER};
use kgorm_core::{
    ActivityKind, ActivityLog, FieldValue, FollowLinks, IdentityCache, KgError, KgObject,
    KgProxy, KgQuery, ReleaseStatus, SchemaRegistry, Scope, Stage, cache_key, normalize_filters,
    normalize_id, uri_from_uuid, uuid_from_uri,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// =============================================================================
// LIST OPTIONS
// =============================================================================

/// Options for [`Store::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Defaults to the store's scope.
    pub scope: Option<Scope>,
    /// Restrict results to one space.
    pub space: Option<String>,
    pub from: usize,
    /// Maximum number of results; `None` pages through everything.
    pub size: Option<usize>,
    /// Linked objects to return in full rather than as proxies.
    pub follow_links: Option<FollowLinks>,
}

impl ListOptions {
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    #[must_use]
    pub fn from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn follow(mut self, follow_links: FollowLinks) -> Self {
        self.follow_links = Some(follow_links);
        self
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct Store<C: KgApi> {
    client: C,
    registry: Arc<SchemaRegistry>,
    cache: Mutex<IdentityCache>,
    activity: Mutex<ActivityLog>,
    default_scope: Scope,
    page_size: usize,
}

impl<C: KgApi> Store<C> {
    #[must_use]
    pub fn new(client: C, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            client,
            registry,
            cache: Mutex::new(IdentityCache::new()),
            activity: Mutex::new(ActivityLog::new()),
            default_scope: Scope::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Scope used by reads that do not name one.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.default_scope = scope;
        self
    }

    /// Results requested per query page (at least 1).
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub fn default_scope(&self) -> Scope {
        self.default_scope
    }

    /// Copy of the writes performed so far.
    pub async fn activity(&self) -> ActivityLog {
        self.activity.lock().await.clone()
    }

    /// Cached object for an instance URI.
    pub async fn cached(&self, id: &str) -> Option<KgObject> {
        self.cache.lock().await.get(id).cloned()
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Objects of `class` matching `filters`.
    ///
    /// With `Scope::Any` both stages are queried and in-progress results win
    /// over released ones with the same id.
    pub async fn list(
        &self,
        class: &str,
        filters: &BTreeMap<String, FieldValue>,
        options: &ListOptions,
    ) -> Result<Vec<KgObject>, OrmError> {
        let schema = self.registry.get(class)?;
        let normalized = normalize_filters(&schema, &self.registry, filters)?;
        self.list_normalized(class, &normalized, options).await
    }

    async fn list_normalized(
        &self,
        class: &str,
        normalized: &BTreeMap<String, String>,
        options: &ListOptions,
    ) -> Result<Vec<KgObject>, OrmError> {
        let schema = self.registry.get(class)?;
        let names: BTreeSet<String> = normalized.keys().cloned().collect();
        let query = schema
            .generate_query(
                &self.registry,
                &names,
                options.follow_links.as_ref(),
                options.space.as_deref(),
            )?
            .serialize();
        let scope = options.scope.unwrap_or(self.default_scope);

        let mut seen = BTreeSet::new();
        let mut objects = Vec::new();
        for &stage in scope.stages() {
            let rows = self
                .run_query(&query, stage, normalized, options.from, options.size)
                .await?;
            for row in &rows {
                let obj = KgObject::from_jsonld(row, &self.registry, Some(class), Some(stage.into()))?;
                if let Some(id) = &obj.id
                    && !seen.insert(id.clone())
                {
                    continue;
                }
                objects.push(obj);
            }
        }
        if let Some(size) = options.size {
            objects.truncate(size);
        }

        let mut cache = self.cache.lock().await;
        for obj in &objects {
            cache.insert(obj);
        }
        debug!(class, count = objects.len(), %scope, "listed instances");
        Ok(objects)
    }

    /// Execute one stage of a query, following pages until `size` rows are
    /// collected or the results run out.
    async fn run_query(
        &self,
        query: &Value,
        stage: Stage,
        filters: &BTreeMap<String, String>,
        from: usize,
        size: Option<usize>,
    ) -> Result<Vec<Value>, OrmError> {
        let mut rows = Vec::new();
        if size == Some(0) {
            return Ok(rows);
        }
        let mut from = from;
        loop {
            let wanted = size.map_or(self.page_size, |s| {
                s.saturating_sub(rows.len()).min(self.page_size)
            });
            let params = QueryParams {
                stage,
                from,
                size: wanted,
                instance_id: None,
                filters: filters.clone(),
            };
            let page = self.client.query(query, &params).await?;
            let received = page.data.len();
            rows.extend(page.data);
            from += received;

            let more_wanted = size.is_none_or(|s| rows.len() < s);
            let more_available = page.total.map_or(received == wanted, |total| from < total);
            if received == 0 || !more_wanted || !more_available {
                break;
            }
        }
        Ok(rows)
    }

    /// Number of objects of `class` matching `filters`.
    ///
    /// For `Scope::Any` this is the larger of the two stage totals, since
    /// in-progress data includes everything that was released.
    pub async fn count(
        &self,
        class: &str,
        filters: &BTreeMap<String, FieldValue>,
        scope: Option<Scope>,
        space: Option<&str>,
    ) -> Result<usize, OrmError> {
        let schema = self.registry.get(class)?;
        let normalized = normalize_filters(&schema, &self.registry, filters)?;
        let names: BTreeSet<String> = normalized.keys().cloned().collect();
        let query = schema
            .generate_query(&self.registry, &names, None, space)?
            .serialize();
        let scope = scope.unwrap_or(self.default_scope);

        let mut count = 0;
        for &stage in scope.stages() {
            let params = QueryParams {
                stage,
                from: 0,
                size: 1,
                instance_id: None,
                filters: normalized.clone(),
            };
            let page = self.client.query(&query, &params).await?;
            count = count.max(page.total.unwrap_or(page.data.len()));
        }
        Ok(count)
    }

    /// Fetch one object of a known class by UUID or URI.
    ///
    /// Without `follow_links` a cached copy read in a compatible scope is
    /// returned without a request.
    pub async fn from_id(
        &self,
        class: &str,
        id: &str,
        scope: Option<Scope>,
        follow_links: Option<&FollowLinks>,
    ) -> Result<Option<KgObject>, OrmError> {
        let uri = normalize_id(id)?;
        let scope = scope.unwrap_or(self.default_scope);
        if follow_links.is_none() {
            let cache = self.cache.lock().await;
            if let Some(obj) = cache.get(&uri)
                && obj.class_name() == class
                && scope_matches(obj.scope, scope)
            {
                debug!(class, id = %uri, "cache hit");
                return Ok(Some(obj.clone()));
            }
        }

        let uuid = uuid_from_uri(&uri)?;
        let schema = self.registry.get(class)?;
        let query = schema
            .generate_query(&self.registry, &BTreeSet::new(), follow_links, None)?
            .serialize();
        for &stage in scope.stages() {
            let params = QueryParams {
                stage,
                from: 0,
                size: 1,
                instance_id: Some(uuid),
                filters: BTreeMap::new(),
            };
            let page = self.client.query(&query, &params).await?;
            if let Some(row) = page.data.first() {
                let obj = KgObject::from_jsonld(row, &self.registry, Some(class), Some(stage.into()))?;
                self.cache.lock().await.insert(&obj);
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }

    /// Fetch an instance of unknown class; the class is taken from `@type`.
    pub async fn from_uri_any(
        &self,
        id: &str,
        scope: Option<Scope>,
    ) -> Result<Option<KgObject>, OrmError> {
        let uri = normalize_id(id)?;
        let scope = scope.unwrap_or(self.default_scope);
        for &stage in scope.stages() {
            if let Some(doc) = self.client.instance_from_full_uri(&uri, stage).await? {
                let obj = KgObject::from_jsonld(&doc, &self.registry, None, Some(stage.into()))?;
                self.cache.lock().await.insert(&obj);
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Fetch the object a proxy stands for.
    pub async fn resolve_proxy(
        &self,
        proxy: &KgProxy,
        follow_links: Option<&FollowLinks>,
    ) -> Result<KgObject, OrmError> {
        let scope = proxy.preferred_scope.unwrap_or(self.default_scope);
        let found = match proxy.classes.as_slice() {
            [class] => self.from_id(class, &proxy.id, Some(scope), follow_links).await?,
            classes => match self.from_uri_any(&proxy.id, Some(scope)).await? {
                Some(obj)
                    if classes.is_empty() || classes.iter().any(|c| c == obj.class_name()) =>
                {
                    if follow_links.is_some() {
                        let class = obj.class_name().to_string();
                        self.from_id(&class, &proxy.id, Some(scope), follow_links).await?
                    } else {
                        Some(obj)
                    }
                }
                _ => None,
            },
        };
        found.ok_or_else(|| {
            KgError::ResolutionFailed(format!("{} [{}]", proxy.id, proxy.classes.join(" | "))).into()
        })
    }

    /// Run a deferred search; classes lacking one of the filtered properties
    /// are skipped.
    pub async fn resolve_query(&self, query: &KgQuery) -> Result<Vec<KgObject>, OrmError> {
        let scope = query.preferred_scope.unwrap_or(self.default_scope);
        let options = ListOptions::default().scope(scope);
        let mut seen = BTreeSet::new();
        let mut objects = Vec::new();
        for class in &query.classes {
            let schema = self.registry.get(class)?;
            let applicable = query
                .filters
                .keys()
                .all(|name| name == ID_PARAMETER || schema.property(name).is_some());
            if !applicable {
                debug!(class, "skipping class without the filtered properties");
                continue;
            }
            for obj in self.list_normalized(class, &query.filters, &options).await? {
                if obj.id.as_ref().is_none_or(|id| seen.insert(id.clone())) {
                    objects.push(obj);
                }
            }
        }
        Ok(objects)
    }

    /// Replace proxies and queries inside `value` by objects, `depth` links deep.
    ///
    /// Embedded metadata and lists do not count as a level.
    pub fn resolve<'a>(
        &'a self,
        value: FieldValue,
        depth: usize,
    ) -> BoxFuture<'a, Result<FieldValue, OrmError>> {
        Box::pin(async move {
            if depth == 0 {
                return Ok(value);
            }
            match value {
                FieldValue::Proxy(proxy) => {
                    let obj = self.resolve_proxy(&proxy, None).await?;
                    let obj = self.resolve_links(obj, depth - 1).await?;
                    Ok(FieldValue::Object(Box::new(obj)))
                }
                FieldValue::Query(query) => {
                    let mut items = Vec::new();
                    for obj in self.resolve_query(&query).await? {
                        let obj = self.resolve_links(obj, depth - 1).await?;
                        items.push(FieldValue::Object(Box::new(obj)));
                    }
                    Ok(FieldValue::List(items))
                }
                FieldValue::Object(obj) => {
                    let obj = self.resolve_links(*obj, depth - 1).await?;
                    Ok(FieldValue::Object(Box::new(obj)))
                }
                FieldValue::Embedded(mut embedded) => {
                    let entries: Vec<(String, FieldValue)> = embedded
                        .values()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    for (name, item) in entries {
                        let resolved = self.resolve(item, depth).await?;
                        embedded.replace_value(&name, resolved);
                    }
                    Ok(FieldValue::Embedded(embedded))
                }
                FieldValue::List(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.resolve(item, depth).await?);
                    }
                    Ok(FieldValue::List(resolved))
                }
                other => Ok(other),
            }
        })
    }

    /// Resolve every link held by `obj`, `depth` levels deep.
    pub async fn resolve_links(&self, mut obj: KgObject, depth: usize) -> Result<KgObject, OrmError> {
        if depth == 0 {
            return Ok(obj);
        }
        let entries: Vec<(String, FieldValue)> = obj
            .values()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in entries {
            let resolved = self.resolve(value, depth).await?;
            obj.replace_value(&name, resolved);
        }
        Ok(obj)
    }

    // =========================================================================
    // EXISTENCE
    // =========================================================================

    /// Check whether `obj` is already in the KG.
    ///
    /// An object with an id is looked up directly. Otherwise its existence
    /// fields are matched, first against the save cache, then with an
    /// in-progress query. On a match `obj` takes the remote id, space and
    /// snapshot.
    pub async fn exists(&self, obj: &mut KgObject) -> Result<bool, OrmError> {
        if let Some(id) = obj.id.clone() {
            return self.exists_by_id(obj, &id).await;
        }
        let Some(filters) = obj.existence_filters() else {
            return Ok(false);
        };
        let normalized = normalize_filters(&obj.schema, &self.registry, &filters)?;
        let key = cache_key(obj.class_name(), &normalized);

        let saved = {
            let cache = self.cache.lock().await;
            cache
                .lookup_saved(&key)
                .map(|id| (id.to_string(), cache.get(id).cloned()))
        };
        if let Some((id, remote)) = saved {
            debug!(class = obj.class_name(), %id, "found in save cache");
            match remote {
                Some(remote) => obj.adopt_remote(&remote),
                None => obj.id = Some(id),
            }
            return Ok(true);
        }

        let class = obj.class_name().to_string();
        let found = self.find_exact(&class, &normalized).await?;
        match found {
            Some(remote) => {
                obj.adopt_remote(&remote);
                if let Some(id) = &remote.id {
                    debug!(%class, %id, "matched existing instance");
                    self.cache.lock().await.record_saved(key, id.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// First in-progress instance whose existence fields equal `normalized`.
    ///
    /// Text filters match substrings, so candidates are checked page by page
    /// until an exact match turns up or the results run out.
    async fn find_exact(
        &self,
        class: &str,
        normalized: &BTreeMap<String, String>,
    ) -> Result<Option<KgObject>, OrmError> {
        let page_size = self.page_size.max(1);
        let mut from = 0;
        loop {
            let options = ListOptions::default()
                .scope(Scope::InProgress)
                .from(from)
                .size(page_size);
            let candidates = self.list_normalized(class, normalized, &options).await?;
            let received = candidates.len();
            let found = candidates.into_iter().find(|candidate| {
                candidate
                    .existence_filters()
                    .and_then(|f| normalize_filters(&candidate.schema, &self.registry, &f).ok())
                    .is_some_and(|f| &f == normalized)
            });
            if found.is_some() || received < page_size {
                return Ok(found);
            }
            from += received;
        }
    }

    async fn exists_by_id(&self, obj: &mut KgObject, id: &str) -> Result<bool, OrmError> {
        let cached = self.cache.lock().await.get(id).cloned();
        if let Some(remote) = cached {
            obj.adopt_remote(&remote);
            return Ok(true);
        }
        let Some(doc) = self
            .client
            .instance_from_full_uri(id, Stage::InProgress)
            .await?
        else {
            return Ok(false);
        };
        let mut remote = KgObject::from_jsonld(
            &doc,
            &self.registry,
            Some(obj.class_name()),
            Some(Scope::InProgress),
        )?;
        if remote.id.is_none() {
            remote.id = Some(id.to_string());
        }
        obj.adopt_remote(&remote);
        self.cache.lock().await.insert(&remote);
        Ok(true)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Create or update `obj`.
    ///
    /// With `recursive`, linked objects (also inside embedded metadata) are
    /// saved first. New instances go to `space`, else the object's space,
    /// else the type's default space. Existing instances receive only the
    /// properties that changed; nothing is sent if none did.
    pub fn save<'a>(
        &'a self,
        obj: &'a mut KgObject,
        space: Option<&'a str>,
        recursive: bool,
    ) -> BoxFuture<'a, Result<ActivityKind, OrmError>> {
        Box::pin(async move {
            if recursive {
                for (_, value) in obj.values_mut() {
                    self.save_links(value, space).await?;
                }
            }
            obj.validate(&self.registry)?;

            let matched_by_fields = obj.id.is_none();
            let known = (obj.id.is_some() && obj.remote_data().is_some()) || self.exists(obj).await?;
            if known {
                self.update(obj, matched_by_fields).await
            } else {
                self.create(obj, space).await
            }
        })
    }

    fn save_links<'a>(
        &'a self,
        value: &'a mut FieldValue,
        space: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), OrmError>> {
        Box::pin(async move {
            match value {
                FieldValue::Object(child) => {
                    let inherited = if child.space.is_none() && child.schema.default_space.is_none() {
                        space
                    } else {
                        None
                    };
                    self.save(&mut **child, inherited, true).await?;
                }
                FieldValue::Embedded(embedded) => {
                    for (_, item) in embedded.values_mut() {
                        self.save_links(item, space).await?;
                    }
                }
                FieldValue::List(items) => {
                    for item in items.iter_mut() {
                        self.save_links(item, space).await?;
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }

    /// PATCH the modified properties. An object matched through its existence
    /// fields never clears remote values it does not hold itself.
    async fn update(&self, obj: &mut KgObject, keep_remote: bool) -> Result<ActivityKind, OrmError> {
        let uuid = obj.uuid()?;
        let mut changes = obj.modified_data()?;
        if keep_remote {
            changes.retain(|_, v| !v.is_null());
        }
        if changes.is_empty() {
            debug!(class = obj.class_name(), %uuid, "no changes to save");
            self.cache.lock().await.insert(obj);
            self.record(ActivityKind::NoChange, obj).await;
            return Ok(ActivityKind::NoChange);
        }

        info!(class = obj.class_name(), %uuid, fields = changes.len(), "updating instance");
        self.client
            .update_instance(uuid, &Value::Object(changes))
            .await?;
        obj.snapshot();
        self.cache.lock().await.insert(obj);
        self.record(ActivityKind::Update, obj).await;
        Ok(ActivityKind::Update)
    }

    async fn create(&self, obj: &mut KgObject, space: Option<&str>) -> Result<ActivityKind, OrmError> {
        let space = space
            .map(str::to_string)
            .or_else(|| obj.space.clone())
            .or_else(|| obj.schema.default_space.clone())
            .ok_or_else(|| OrmError::NoSpace(obj.class_name().to_string()))?;
        let uuid = match obj.id {
            Some(_) => obj.uuid()?,
            None => Uuid::new_v4(),
        };
        let mut doc = obj.to_jsonld(false)?;
        if let Some(map) = doc.as_object_mut() {
            map.remove("@id");
        }

        info!(class = obj.class_name(), %uuid, space = %space, "creating instance");
        self.client.create_new_instance(&doc, &space, uuid).await?;
        let uri = uri_from_uuid(&uuid);
        obj.id = Some(uri.clone());
        obj.space = Some(space);
        obj.scope = Some(Scope::InProgress);
        obj.snapshot();

        {
            let mut cache = self.cache.lock().await;
            cache.insert(obj);
            if let Some(filters) = obj.existence_filters()
                && let Ok(normalized) = normalize_filters(&obj.schema, &self.registry, &filters)
            {
                cache.record_saved(cache_key(obj.class_name(), &normalized), uri);
            }
        }
        self.record(ActivityKind::Create, obj).await;
        Ok(ActivityKind::Create)
    }

    pub async fn delete(&self, obj: &KgObject) -> Result<(), OrmError> {
        let uuid = obj.uuid()?;
        info!(class = obj.class_name(), %uuid, "deleting instance");
        self.client.delete_instance(uuid).await?;
        if let Some(id) = &obj.id {
            self.cache.lock().await.remove(id);
        }
        self.record(ActivityKind::Delete, obj).await;
        Ok(())
    }

    pub async fn release(&self, obj: &KgObject) -> Result<(), OrmError> {
        let uuid = obj.uuid()?;
        info!(class = obj.class_name(), %uuid, "releasing instance");
        self.client.release(uuid).await?;
        self.record(ActivityKind::Release, obj).await;
        Ok(())
    }

    pub async fn unrelease(&self, obj: &KgObject) -> Result<(), OrmError> {
        let uuid = obj.uuid()?;
        info!(class = obj.class_name(), %uuid, "unreleasing instance");
        self.client.unrelease(uuid).await?;
        self.record(ActivityKind::Unrelease, obj).await;
        Ok(())
    }

    pub async fn release_status(&self, obj: &KgObject) -> Result<ReleaseStatus, OrmError> {
        let uuid = obj.uuid()?;
        Ok(self.client.release_status(uuid).await?)
    }

    async fn record(&self, kind: ActivityKind, obj: &KgObject) {
        self.activity.lock().await.record(
            kind,
            obj.class_name(),
            obj.id.clone().unwrap_or_default(),
            obj.space.clone(),
        );
    }
}

/// A cached object read in `cached` scope can serve a read in `wanted` scope.
fn scope_matches(cached: Option<Scope>, wanted: Scope) -> bool {
    wanted == Scope::Any || cached == Some(wanted)
}
