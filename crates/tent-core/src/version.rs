//! Version id computation.
//!
//! The version id of a post is the truncated SHA-512 of the canonical JSON of
//! its version projection. The projection keeps only version-significant
//! members and compacts self references:
//!
//! - `entity` is replaced by `original_entity` when one is set
//! - private mentions are dropped, and so is the mention list once empty
//! - in mentions, refs, and version parents, `entity` is elided when it equals
//!   the post's entity and `post` is elided when it equals the post's id; a
//!   distinct `original_entity` is written as the reference's `entity`
//! - content shorter than 3 bytes (absent, `{}`, `""`) is dropped
//! - permissions, `received_at`, `version.id`, and `app.id` never take part

use serde_json::{Map, Value};

use crate::encoding::{parse_raw, to_canonical_bytes};
use crate::error::Result;
use crate::hash::VersionId;
use crate::post::{Post, PostAttachment, PostLicense, PostVersion};

/// Content this short carries nothing worth hashing.
const MIN_CONTENT_LEN: usize = 3;

/// The reference fields shared by mentions, refs, and version parents.
struct Reference<'a> {
    entity: &'a str,
    original_entity: &'a str,
    post: &'a str,
    version: &'a str,
    post_type: &'a str,
}

impl Post {
    /// Build the JSON projection that the version id is computed over.
    pub fn version_projection(&self) -> Result<Value> {
        let mut data = Map::new();

        insert_text(&mut data, "id", &self.id);
        if self.original_entity.is_empty() {
            insert_text(&mut data, "entity", &self.entity);
        } else {
            insert_text(&mut data, "entity", &self.original_entity);
        }
        data.insert("type".into(), Value::String(self.post_type.clone()));

        if let Some(raw) = &self.content {
            if raw.get().len() >= MIN_CONTENT_LEN {
                data.insert("content".into(), parse_raw(raw.get())?);
            }
        }

        if let Some(version) = &self.version {
            let projected = self.project_version(version);
            if !projected.is_empty() {
                data.insert("version".into(), Value::Object(projected));
            }
        }

        if !self.refs.is_empty() {
            let refs = self
                .refs
                .iter()
                .map(|r| {
                    self.project_reference(&Reference {
                        entity: &r.entity,
                        original_entity: &r.original_entity,
                        post: &r.post,
                        version: &r.version,
                        post_type: &r.post_type,
                    })
                })
                .map(Value::Object)
                .collect();
            data.insert("refs".into(), Value::Array(refs));
        }

        let mentions: Vec<Value> = self
            .mentions
            .iter()
            .filter(|m| m.is_public())
            .map(|m| {
                self.project_reference(&Reference {
                    entity: &m.entity,
                    original_entity: &m.original_entity,
                    post: &m.post,
                    version: &m.version,
                    post_type: &m.post_type,
                })
            })
            .filter(|m| !m.is_empty())
            .map(Value::Object)
            .collect();
        if !mentions.is_empty() {
            data.insert("mentions".into(), Value::Array(mentions));
        }

        if !self.licenses.is_empty() {
            let licenses = self.licenses.iter().map(project_license).collect();
            data.insert("licenses".into(), Value::Array(licenses));
        }

        if !self.attachments.is_empty() {
            let attachments = self.attachments.iter().map(project_attachment).collect();
            data.insert("attachments".into(), Value::Array(attachments));
        }

        if let Some(app) = &self.app {
            let mut projected = Map::new();
            insert_text(&mut projected, "name", &app.name);
            insert_text(&mut projected, "url", &app.url);
            if !projected.is_empty() {
                data.insert("app".into(), Value::Object(projected));
            }
        }

        if let Some(ts) = self.published_at {
            data.insert("published_at".into(), ts.into());
        }

        Ok(Value::Object(data))
    }

    /// Canonical bytes of the version projection.
    pub fn version_canonical_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_bytes(&self.version_projection()?)
    }

    /// Compute this post's version id.
    pub fn calculate_version(&self) -> Result<VersionId> {
        let bytes = self.version_canonical_bytes()?;
        Ok(VersionId::digest(&bytes))
    }

    /// Recompute the version id and store it in `version.id`.
    pub fn set_version_id(&mut self) -> Result<VersionId> {
        let id = self.calculate_version()?;
        self.version.get_or_insert_with(PostVersion::default).id = id.to_hex();
        Ok(id)
    }

    /// Whether the stored version id matches a fresh computation.
    pub fn verify_version(&self) -> Result<bool> {
        let Some(stored) = self.version.as_ref().map(|v| v.id.as_str()) else {
            return Ok(false);
        };
        Ok(self.calculate_version()?.to_hex() == stored)
    }

    fn project_version(&self, version: &PostVersion) -> Map<String, Value> {
        let mut projected = Map::new();
        if !version.parents.is_empty() {
            let parents = version
                .parents
                .iter()
                .map(|p| {
                    let mut parent = self.project_reference(&Reference {
                        entity: &p.entity,
                        original_entity: &p.original_entity,
                        post: &p.post,
                        version: "",
                        post_type: "",
                    });
                    // A parent always names its version, even when empty.
                    parent.insert("version".into(), Value::String(p.version.clone()));
                    Value::Object(parent)
                })
                .collect();
            projected.insert("parents".into(), Value::Array(parents));
        }
        insert_text(&mut projected, "message", &version.message);
        if let Some(ts) = version.published_at {
            projected.insert("published_at".into(), ts.into());
        }
        projected
    }

    fn project_reference(&self, r: &Reference<'_>) -> Map<String, Value> {
        let mut projected = Map::new();
        if r.entity != self.entity {
            insert_text(&mut projected, "entity", r.entity);
        }
        if !r.original_entity.is_empty() && r.original_entity != self.original_entity {
            projected.insert("entity".into(), Value::String(r.original_entity.to_string()));
        }
        if r.post != self.id {
            insert_text(&mut projected, "post", r.post);
        }
        insert_text(&mut projected, "version", r.version);
        insert_text(&mut projected, "type", r.post_type);
        projected
    }
}

fn project_license(license: &PostLicense) -> Value {
    let mut projected = Map::new();
    projected.insert("url".into(), Value::String(license.url.clone()));
    Value::Object(projected)
}

fn project_attachment(att: &PostAttachment) -> Value {
    let mut projected = Map::new();
    projected.insert("name".into(), Value::String(att.name.clone()));
    projected.insert("category".into(), Value::String(att.category.clone()));
    projected.insert("content_type".into(), Value::String(att.content_type.clone()));
    if att.size > 0 {
        projected.insert("size".into(), att.size.into());
    }
    insert_text(&mut projected, "digest", &att.digest);
    Value::Object(projected)
}

fn insert_text(map: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}
