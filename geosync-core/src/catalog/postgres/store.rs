use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::Transaction;
use deadpool_postgres::tokio_postgres::{Error as TokioPgError, Row};
use postgis::ewkb;
use postgres::types::Json;
use tracing::{debug, info};

use crate::catalog::CatalogError::{
    DuplicateName, PostgresError, UnknownDataset, UnknownFeatureSet,
};
use crate::catalog::postgres::ewkb::{from_ewkb, to_ewkb};
use crate::catalog::postgres::{PostgresPool, SCHEMA};
use crate::catalog::{
    CatalogCounts, CatalogError, CatalogPolicies, CatalogResult, CatalogStore, Collection,
    CollectionId, CollectionMirror, ColorRamp, Colormap, ColormapId, CreatedFeatureSet, DatasetId,
    Feature, FeatureId, FeatureSet, FeatureSetId, FeatureSetSource, InsertPolicy, LayerId,
    ManualFeatureSet, MirroredCollection, NewDataset, NewFeature, NewStyle, Paint, Properties,
    Style, StyleId,
};

fn pg(context: &'static str) -> impl FnOnce(TokioPgError) -> CatalogError {
    move |e| PostgresError(e, context)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Catalog stored in `PostgreSQL` tables with `PostGIS` geometries.
///
/// Every write runs in its own transaction.
#[derive(Clone, Debug)]
pub struct PostgresCatalog {
    pool: PostgresPool,
}

impl PostgresCatalog {
    /// Connect to the database at `connection_string`.
    pub async fn new(connection_string: &str, pool_size: usize) -> CatalogResult<Self> {
        Ok(Self::from_pool(
            PostgresPool::new(connection_string, pool_size).await?,
        ))
    }

    /// Use an existing pool.
    #[must_use]
    pub fn from_pool(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

async fn layer_by_name(tx: &Transaction<'_>, name: &str) -> CatalogResult<Option<LayerId>> {
    Ok(tx
        .query_opt(
            "SELECT id FROM layers WHERE name = $1 ORDER BY id LIMIT 1",
            &[&name],
        )
        .await
        .map_err(pg("looking up a layer"))?
        .map(|row| LayerId(row.get("id"))))
}

async fn insert_layer(tx: &Transaction<'_>, name: &str) -> CatalogResult<LayerId> {
    let row = tx
        .query_one("INSERT INTO layers (name) VALUES ($1) RETURNING id", &[&name])
        .await
        .map_err(pg("inserting a layer"))?;
    Ok(LayerId(row.get("id")))
}

async fn insert_style(
    tx: &Transaction<'_>,
    style: &NewStyle,
) -> CatalogResult<(StyleId, Option<ColormapId>)> {
    let colormap_id = match &style.colormap {
        Some(ramp) => {
            let row = tx
                .query_one(
                    r"
INSERT INTO colormaps (property, min_color, max_color, min_value, max_value)
VALUES ($1, $2, $3, $4, $5)
RETURNING id",
                    &[
                        &ramp.property,
                        &ramp.min_color,
                        &ramp.max_color,
                        &ramp.min_value,
                        &ramp.max_value,
                    ],
                )
                .await
                .map_err(pg("inserting a colormap"))?;
            Some(ColormapId(row.get("id")))
        }
        None => None,
    };

    let p = &style.paint;
    let row = tx
        .query_one(
            r"
INSERT INTO styles (name, popup_properties, border_color, area_color, marker_icon, marker_color,
                    line_weight, stroke, opacity, line_cap, line_join, dash_array, dash_offset,
                    fill, fill_opacity, fill_rule, colormap_id)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
RETURNING id",
            &[
                &style.name,
                &Json(&style.popup_properties),
                &p.border_color,
                &p.area_color,
                &p.marker_icon,
                &p.marker_color,
                &p.line_weight,
                &p.stroke,
                &p.opacity,
                &p.line_cap,
                &p.line_join,
                &p.dash_array,
                &p.dash_offset,
                &p.fill,
                &p.fill_opacity,
                &p.fill_rule,
                &colormap_id.map(|c| c.0),
            ],
        )
        .await
        .map_err(pg("inserting a style"))?;
    Ok((StyleId(row.get("id")), colormap_id))
}

async fn insert_feature_set(
    tx: &Transaction<'_>,
    name: &str,
    layer_id: LayerId,
    style_id: StyleId,
    collection_id: Option<CollectionId>,
) -> CatalogResult<FeatureSetId> {
    let row = tx
        .query_one(
            r"
INSERT INTO feature_sets (name, layer_id, style_id, collection_id)
VALUES ($1, $2, $3, $4)
RETURNING id",
            &[&name, &layer_id.0, &style_id.0, &collection_id.map(|c| c.0)],
        )
        .await
        .map_err(pg("inserting a feature set"))?;
    Ok(FeatureSetId(row.get("id")))
}

async fn insert_feature_rows(
    tx: &Transaction<'_>,
    feature_set: FeatureSetId,
    features: &[NewFeature],
) -> CatalogResult<u64> {
    let stmt = tx
        .prepare_cached(
            r"
INSERT INTO features (feature_set_id, geometry_type, geometry, properties, timestamp)
VALUES ($1, $2, $3, $4, $5)",
        )
        .await
        .map_err(pg("preparing feature insert"))?;
    let mut count = 0;
    for feature in features {
        let geometry = to_ewkb(&feature.geometry);
        count += tx
            .execute(
                &stmt,
                &[
                    &feature_set.0,
                    &feature.geometry_type().to_string(),
                    &*geometry,
                    &Json(&feature.properties),
                    &feature.timestamp,
                ],
            )
            .await
            .map_err(pg("inserting a feature"))?;
    }
    Ok(count)
}

fn collection_from_row(row: &Row) -> Option<Collection> {
    let id: Option<i32> = row.get("collection_id");
    id.map(|id| Collection {
        id: CollectionId(id),
        dataset_id: DatasetId(row.get("dataset_id")),
        identifier: row.get("identifier"),
        name: row.get("collection_name"),
        items_url: row.get("items_url"),
        collection_url: row.get("collection_url"),
        entries: row
            .get::<_, Option<i64>>("entries")
            .and_then(|v| u64::try_from(v).ok()),
    })
}

fn style_from_row(row: &Row) -> Style {
    let colormap_id: Option<i32> = row.get("colormap_id");
    let popup: Json<BTreeMap<String, String>> = row.get("popup_properties");
    Style {
        id: StyleId(row.get("id")),
        name: row.get("name"),
        popup_properties: popup.0,
        paint: Paint {
            border_color: row.get("border_color"),
            area_color: row.get("area_color"),
            marker_icon: row.get("marker_icon"),
            marker_color: row.get("marker_color"),
            line_weight: row.get("line_weight"),
            stroke: row.get("stroke"),
            opacity: row.get("opacity"),
            line_cap: row.get("line_cap"),
            line_join: row.get("line_join"),
            dash_array: row.get("dash_array"),
            dash_offset: row.get("dash_offset"),
            fill: row.get("fill"),
            fill_opacity: row.get("fill_opacity"),
            fill_rule: row.get("fill_rule"),
        },
        colormap: colormap_id.map(|id| Colormap {
            id: ColormapId(id),
            ramp: ColorRamp {
                property: row.get("property"),
                min_color: row.get("min_color"),
                max_color: row.get("max_color"),
                min_value: row.get("min_value"),
                max_value: row.get("max_value"),
            },
        }),
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn initialize(&self) -> CatalogResult<()> {
        let conn = self.pool.get().await?;
        for stmt in SCHEMA {
            conn.batch_execute(stmt)
                .await
                .map_err(pg("creating the catalog schema"))?;
        }
        let postgis = self.pool.require_postgis().await?;
        info!(
            "Catalog schema is ready in {} with PostGIS {postgis}",
            self.pool.get_id()
        );
        Ok(())
    }

    async fn create_dataset(
        &self,
        dataset: &NewDataset,
        policy: InsertPolicy,
    ) -> CatalogResult<DatasetId> {
        let conn = self.pool.get().await?;
        if policy == InsertPolicy::GetOrCreate
            && let Some(row) = conn
                .query_opt(
                    "SELECT id FROM datasets WHERE name = $1 ORDER BY id LIMIT 1",
                    &[&dataset.name],
                )
                .await
                .map_err(pg("looking up a dataset"))?
        {
            return Ok(DatasetId(row.get("id")));
        }
        let row = conn
            .query_one(
                r"
INSERT INTO datasets (name, description, url, collections)
VALUES ($1, $2, $3, $4)
RETURNING id",
                &[
                    &dataset.name,
                    &dataset.description,
                    &dataset.url,
                    &dataset.collections,
                ],
            )
            .await
            .map_err(pg("inserting a dataset"))?;
        Ok(DatasetId(row.get("id")))
    }

    async fn mirror_collection(
        &self,
        mirror: &CollectionMirror,
        policies: &CatalogPolicies,
    ) -> CatalogResult<MirroredCollection> {
        let mut conn = self.pool.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(pg("starting a transaction"))?;

        let dataset_exists: bool = tx
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM datasets WHERE id = $1)",
                &[&mirror.dataset_id.0],
            )
            .await
            .map_err(pg("looking up a dataset"))?
            .get(0);
        if !dataset_exists {
            return Err(UnknownDataset(mirror.dataset_id));
        }

        if policies.collection == InsertPolicy::GetOrCreate
            && let Some(row) = tx
                .query_opt(
                    r"
SELECT c.id AS collection_id, fs.id AS feature_set_id, fs.layer_id, fs.style_id, s.colormap_id
FROM collections c
         JOIN feature_sets fs ON fs.collection_id = c.id
         JOIN styles s ON s.id = fs.style_id
WHERE c.dataset_id = $1 AND c.identifier = $2
ORDER BY c.id
LIMIT 1",
                    &[&mirror.dataset_id.0, &mirror.collection.identifier],
                )
                .await
                .map_err(pg("looking up a collection"))?
        {
            return Ok(MirroredCollection {
                layer_id: LayerId(row.get("layer_id")),
                layer_created: false,
                style_id: StyleId(row.get("style_id")),
                colormap_id: row.get::<_, Option<i32>>("colormap_id").map(ColormapId),
                collection_id: CollectionId(row.get("collection_id")),
                feature_set_id: FeatureSetId(row.get("feature_set_id")),
                reused: true,
            });
        }

        let (layer_id, layer_created) = match policies.layer {
            InsertPolicy::GetOrCreate => match layer_by_name(&tx, &mirror.layer_name).await? {
                Some(id) => (id, false),
                None => (insert_layer(&tx, &mirror.layer_name).await?, true),
            },
            InsertPolicy::AlwaysInsert => (insert_layer(&tx, &mirror.layer_name).await?, true),
        };
        let (style_id, colormap_id) = insert_style(&tx, &mirror.style).await?;

        let new = &mirror.collection;
        let row = tx
            .query_one(
                r"
INSERT INTO collections (dataset_id, identifier, name, items_url, collection_url, entries)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING id",
                &[
                    &mirror.dataset_id.0,
                    &new.identifier,
                    &new.name,
                    &new.items_url,
                    &new.collection_url,
                    &new.entries.and_then(|e| i64::try_from(e).ok()),
                ],
            )
            .await
            .map_err(pg("inserting a collection"))?;
        let collection_id = CollectionId(row.get("id"));
        let feature_set_id = insert_feature_set(
            &tx,
            &mirror.feature_set_name,
            layer_id,
            style_id,
            Some(collection_id),
        )
        .await?;

        tx.commit()
            .await
            .map_err(pg("committing a mirrored collection"))?;
        Ok(MirroredCollection {
            layer_id,
            layer_created,
            style_id,
            colormap_id,
            collection_id,
            feature_set_id,
            reused: false,
        })
    }

    async fn feature_sets(&self) -> CatalogResult<Vec<FeatureSetSource>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                r"
SELECT fs.id, fs.name, fs.layer_id, fs.style_id, fs.collection_id,
       c.dataset_id, c.identifier, c.name AS collection_name,
       c.items_url, c.collection_url, c.entries
FROM feature_sets fs
         LEFT JOIN collections c ON c.id = fs.collection_id
ORDER BY fs.id",
                &[],
            )
            .await
            .map_err(pg("listing feature sets"))?;
        Ok(rows
            .iter()
            .map(|row| {
                let collection = collection_from_row(row);
                FeatureSetSource {
                    feature_set: FeatureSet {
                        id: FeatureSetId(row.get("id")),
                        name: row.get("name"),
                        layer_id: LayerId(row.get("layer_id")),
                        style_id: StyleId(row.get("style_id")),
                        collection_id: collection.as_ref().map(|c| c.id),
                    },
                    collection,
                }
            })
            .collect())
    }

    async fn delete_features(&self, feature_set: FeatureSetId) -> CatalogResult<u64> {
        let conn = self.pool.get().await?;
        let deleted = conn
            .execute(
                "DELETE FROM features WHERE feature_set_id = $1",
                &[&feature_set.0],
            )
            .await
            .map_err(pg("deleting features"))?;
        debug!("Deleted {deleted} features of feature set {feature_set}");
        Ok(deleted)
    }

    async fn insert_features(
        &self,
        feature_set: FeatureSetId,
        features: &[NewFeature],
    ) -> CatalogResult<u64> {
        let mut conn = self.pool.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(pg("starting a transaction"))?;
        let exists: bool = tx
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM feature_sets WHERE id = $1)",
                &[&feature_set.0],
            )
            .await
            .map_err(pg("looking up a feature set"))?
            .get(0);
        if !exists {
            return Err(UnknownFeatureSet(feature_set));
        }
        let count = insert_feature_rows(&tx, feature_set, features).await?;
        tx.commit().await.map_err(pg("committing features"))?;
        Ok(count)
    }

    async fn features(&self, feature_set: FeatureSetId) -> CatalogResult<Vec<Feature>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                r"
SELECT id, geometry, properties, timestamp
FROM features
WHERE feature_set_id = $1
ORDER BY id",
                &[&feature_set.0],
            )
            .await
            .map_err(pg("reading features"))?;
        rows.iter()
            .map(|row| {
                let id: i32 = row.get("id");
                let geometry: ewkb::Geometry = row
                    .try_get("geometry")
                    .map_err(pg("decoding a feature geometry"))?;
                let properties: Json<Properties> = row.get("properties");
                Ok(Feature {
                    id: FeatureId(id),
                    feature_set_id: feature_set,
                    geometry: from_ewkb(&geometry, id)?,
                    properties: properties.0,
                    timestamp: row.get("timestamp"),
                })
            })
            .collect()
    }

    async fn style(&self, id: StyleId) -> CatalogResult<Option<Style>> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                r"
SELECT s.*, c.property, c.min_color, c.max_color, c.min_value, c.max_value
FROM styles s
         LEFT JOIN colormaps c ON c.id = s.colormap_id
WHERE s.id = $1",
                &[&id.0],
            )
            .await
            .map_err(pg("reading a style"))?;
        Ok(row.as_ref().map(style_from_row))
    }

    async fn layer_names(&self, prefix: &str) -> CatalogResult<Vec<String>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT name FROM layers WHERE starts_with(name, $1) ORDER BY id",
                &[&prefix],
            )
            .await
            .map_err(pg("listing layers"))?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn ensure_layer(&self, name: &str) -> CatalogResult<LayerId> {
        let mut conn = self.pool.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(pg("starting a transaction"))?;
        let id = match layer_by_name(&tx, name).await? {
            Some(id) => id,
            None => insert_layer(&tx, name).await?,
        };
        tx.commit().await.map_err(pg("committing a layer"))?;
        Ok(id)
    }

    async fn ensure_style(&self, style: &NewStyle) -> CatalogResult<StyleId> {
        let mut conn = self.pool.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(pg("starting a transaction"))?;
        let existing = tx
            .query_opt(
                "SELECT id FROM styles WHERE name = $1 ORDER BY id LIMIT 1",
                &[&style.name],
            )
            .await
            .map_err(pg("looking up a style"))?;
        let id = match existing {
            Some(row) => StyleId(row.get("id")),
            None => insert_style(&tx, style).await?.0,
        };
        tx.commit().await.map_err(pg("committing a style"))?;
        Ok(id)
    }

    async fn create_manual_feature_set(
        &self,
        manual: &ManualFeatureSet,
    ) -> CatalogResult<CreatedFeatureSet> {
        let mut conn = self.pool.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(pg("starting a transaction"))?;
        if layer_by_name(&tx, &manual.layer_name).await?.is_some() {
            return Err(DuplicateName("layer", manual.layer_name.clone()));
        }
        let layer_id = insert_layer(&tx, &manual.layer_name).await?;
        let (style_id, _) = insert_style(&tx, &manual.style).await?;
        let feature_set_id =
            insert_feature_set(&tx, &manual.feature_set_name, layer_id, style_id, None).await?;
        let features = insert_feature_rows(&tx, feature_set_id, &manual.features).await?;
        tx.commit()
            .await
            .map_err(pg("committing a manual feature set"))?;
        Ok(CreatedFeatureSet {
            layer_id,
            style_id,
            feature_set_id,
            features,
        })
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> CatalogResult<bool> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                r"
INSERT INTO leases (name, holder, expires_at)
VALUES ($1, $2, now() + make_interval(secs => $3))
ON CONFLICT (name) DO UPDATE
    SET holder = excluded.holder, expires_at = excluded.expires_at
    WHERE leases.expires_at < now() OR leases.holder = excluded.holder
RETURNING holder",
                &[&name, &holder, &ttl.as_secs_f64()],
            )
            .await
            .map_err(pg("acquiring a lease"))?;
        Ok(row.is_some())
    }

    async fn release_lease(&self, name: &str, holder: &str) -> CatalogResult<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "DELETE FROM leases WHERE name = $1 AND holder = $2",
            &[&name, &holder],
        )
        .await
        .map_err(pg("releasing a lease"))?;
        Ok(())
    }

    async fn counts(&self) -> CatalogResult<CatalogCounts> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                r"
SELECT (SELECT count(*) FROM datasets)     AS datasets,
       (SELECT count(*) FROM collections)  AS collections,
       (SELECT count(*) FROM layers)       AS layers,
       (SELECT count(*) FROM styles)       AS styles,
       (SELECT count(*) FROM colormaps)    AS colormaps,
       (SELECT count(*) FROM feature_sets) AS feature_sets,
       (SELECT count(*) FROM features)     AS features",
                &[],
            )
            .await
            .map_err(pg("counting catalog rows"))?;
        Ok(CatalogCounts {
            datasets: to_count(row.get("datasets")),
            collections: to_count(row.get("collections")),
            layers: to_count(row.get("layers")),
            styles: to_count(row.get("styles")),
            colormaps: to_count(row.get("colormaps")),
            feature_sets: to_count(row.get("feature_sets")),
            features: to_count(row.get("features")),
        })
    }
}
