/// Statements creating the catalog schema. Each one is safe to re-run.
pub const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS postgis",
    r"
CREATE TABLE IF NOT EXISTS datasets (
    id          serial PRIMARY KEY,
    name        text NOT NULL,
    description text,
    url         text NOT NULL,
    collections text[] NOT NULL DEFAULT '{}'
)",
    r"
CREATE TABLE IF NOT EXISTS collections (
    id             serial PRIMARY KEY,
    dataset_id     integer NOT NULL REFERENCES datasets (id) ON DELETE CASCADE,
    identifier     text NOT NULL,
    name           text NOT NULL,
    items_url      text,
    collection_url text,
    entries        bigint
)",
    "CREATE INDEX IF NOT EXISTS collections_dataset_identifier_idx ON collections (dataset_id, identifier)",
    r"
CREATE TABLE IF NOT EXISTS layers (
    id   serial PRIMARY KEY,
    name text NOT NULL
)",
    "CREATE INDEX IF NOT EXISTS layers_name_idx ON layers (name)",
    r"
CREATE TABLE IF NOT EXISTS colormaps (
    id        serial PRIMARY KEY,
    property  text NOT NULL,
    min_color text NOT NULL,
    max_color text NOT NULL,
    min_value double precision NOT NULL,
    max_value double precision NOT NULL
)",
    r"
CREATE TABLE IF NOT EXISTS styles (
    id               serial PRIMARY KEY,
    name             text NOT NULL,
    popup_properties jsonb NOT NULL DEFAULT '{}',
    border_color     text NOT NULL,
    area_color       text NOT NULL,
    marker_icon      text NOT NULL,
    marker_color     text NOT NULL,
    line_weight      double precision NOT NULL,
    stroke           boolean NOT NULL,
    opacity          double precision NOT NULL,
    line_cap         text NOT NULL,
    line_join        text NOT NULL,
    dash_array       text,
    dash_offset      text,
    fill             boolean NOT NULL,
    fill_opacity     double precision NOT NULL,
    fill_rule        text NOT NULL,
    colormap_id      integer REFERENCES colormaps (id)
)",
    r"
CREATE TABLE IF NOT EXISTS feature_sets (
    id            serial PRIMARY KEY,
    name          text NOT NULL,
    layer_id      integer NOT NULL REFERENCES layers (id),
    style_id      integer NOT NULL REFERENCES styles (id),
    collection_id integer REFERENCES collections (id)
)",
    r"
CREATE TABLE IF NOT EXISTS features (
    id             serial PRIMARY KEY,
    feature_set_id integer NOT NULL REFERENCES feature_sets (id) ON DELETE CASCADE,
    geometry_type  text NOT NULL,
    geometry       geometry(Geometry, 4326) NOT NULL,
    properties     jsonb NOT NULL DEFAULT '{}',
    timestamp      timestamptz
)",
    "CREATE INDEX IF NOT EXISTS features_feature_set_idx ON features (feature_set_id)",
    r"
CREATE TABLE IF NOT EXISTS leases (
    name       text PRIMARY KEY,
    holder     text NOT NULL,
    expires_at timestamptz NOT NULL
)",
];
