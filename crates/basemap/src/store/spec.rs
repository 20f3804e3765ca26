//! Declarative table schemas for the published dataset.
//!
//! One static [`TableSpec`] per entity type drives staging DDL, bulk-load
//! statements and index DDL, so the reload protocol itself stays generic.
//! Index names follow `{table}_{col1}_{col2}` over the physical table name;
//! a spatial index is declared under its geometry column's name but built
//! over the explicit bbox/coordinate columns (SQLite has no GiST).

use crate::entities::{
    Address, Building, BuildingFace, BuildingSolid, CadastralParcel, ForbiddenArea, Municipality,
    Street,
};
use geomkit::wkt;
use rusqlite::types::Value;

/// Spatial reference of every published geometry column: Belgian Lambert 72.
pub const WORKING_SRID: i64 = 31370;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetGroup {
    ParcelAndBuilding,
    Construction3d,
}

impl DatasetGroup {
    pub const fn name(self) -> &'static str {
        match self {
            DatasetGroup::ParcelAndBuilding => "parcel_and_building",
            DatasetGroup::Construction3d => "3d_construction",
        }
    }

    /// Every table of the group, in load order.
    pub const fn tables(self) -> &'static [&'static TableSpec] {
        match self {
            DatasetGroup::ParcelAndBuilding => &PARCEL_AND_BUILDING_TABLES,
            DatasetGroup::Construction3d => &CONSTRUCTION_3D_TABLES,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    const fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnSpec {
    pub const fn pk(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            primary_key: true,
        }
    }

    pub const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            primary_key: false,
        }
    }

    pub const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            primary_key: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum IndexKind {
    /// Ordered B-tree lookup index for identifier/FK columns.
    Ordered,
    /// Bbox/coordinate index standing in for a spatial index.
    Spatial,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    /// Columns the index is named after.
    pub label: &'static [&'static str],
    /// Physical columns the index is built over.
    pub on: &'static [&'static str],
    pub kind: IndexKind,
}

impl IndexSpec {
    pub const fn ordered(columns: &'static [&'static str]) -> Self {
        Self {
            label: columns,
            on: columns,
            kind: IndexKind::Ordered,
        }
    }

    pub fn name(&self, physical: &str) -> String {
        format!("{physical}_{}", self.label.join("_"))
    }
}

/// A geometry column of a published table, registered in the
/// `geometry_columns` table with the working SRID.
#[derive(Debug, Clone, Copy)]
pub struct GeometryColumn {
    /// Column name as registered; point geometries stored as coordinate
    /// columns register under their logical name (`position`, `point`).
    pub column: &'static str,
    pub geometry_type: &'static str,
}

#[derive(Debug)]
pub struct TableSpec {
    pub logical: &'static str,
    pub columns: &'static [ColumnSpec],
    pub indexes: &'static [IndexSpec],
    pub geometry_columns: &'static [GeometryColumn],
}

impl TableSpec {
    pub fn create_sql(&self, physical: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("\"{}\" {}", c.name, c.ty.sql());
                if c.primary_key {
                    def.push_str(" PRIMARY KEY");
                }
                if !c.nullable && !c.primary_key {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect::<Vec<_>>()
            .join(",\n  ");
        format!("CREATE TABLE \"{physical}\" (\n  {columns}\n)")
    }

    pub fn insert_sql(&self, physical: &str) -> String {
        let names = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!("INSERT INTO \"{physical}\" ({names}) VALUES ({placeholders})")
    }

    pub fn index_sql(&self, physical: &str) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                let columns = index
                    .on
                    .iter()
                    .map(|c| format!("\"{c}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE INDEX \"{}\" ON \"{physical}\" ({columns})",
                    index.name(physical)
                )
            })
            .collect()
    }
}

pub static STREET: TableSpec = TableSpec {
    logical: "street",
    columns: &[
        ColumnSpec::pk("street_id", ColumnType::Integer),
        ColumnSpec::required("name_dutch", ColumnType::Text),
        ColumnSpec::required("name_french", ColumnType::Text),
        ColumnSpec::required("cleaned_name_dutch", ColumnType::Text),
        ColumnSpec::required("cleaned_name_french", ColumnType::Text),
    ],
    indexes: &[],
    geometry_columns: &[],
};

pub static MUNICIPALITY: TableSpec = TableSpec {
    logical: "municipality",
    columns: &[
        ColumnSpec::pk("municipality_id", ColumnType::Integer),
        ColumnSpec::required("name_dutch", ColumnType::Text),
        ColumnSpec::required("name_french", ColumnType::Text),
    ],
    indexes: &[],
    geometry_columns: &[],
};

pub static ADDRESS: TableSpec = TableSpec {
    logical: "address",
    columns: &[
        ColumnSpec::pk("id", ColumnType::Integer),
        ColumnSpec::required("address_id", ColumnType::Integer),
        ColumnSpec::required("street_id", ColumnType::Integer),
        ColumnSpec::required("municipality_id", ColumnType::Integer),
        ColumnSpec::nullable("parent_id", ColumnType::Integer),
        ColumnSpec::nullable("cadastral_parcel_id", ColumnType::Integer),
        ColumnSpec::nullable("building_id", ColumnType::Integer),
        ColumnSpec::nullable("carto_angle", ColumnType::Real),
        ColumnSpec::required("postal_code", ColumnType::Integer),
        ColumnSpec::required("police_number", ColumnType::Text),
        ColumnSpec::nullable("box_number", ColumnType::Text),
        ColumnSpec::required("stat_nis_code", ColumnType::Text),
        ColumnSpec::required("position_x", ColumnType::Real),
        ColumnSpec::required("position_y", ColumnType::Real),
        ColumnSpec::required("geometry", ColumnType::Text),
    ],
    indexes: &[
        IndexSpec::ordered(&["address_id"]),
        IndexSpec::ordered(&["street_id"]),
        IndexSpec {
            label: &["position"],
            on: &["position_x", "position_y"],
            kind: IndexKind::Spatial,
        },
    ],
    geometry_columns: &[
        GeometryColumn {
            column: "position",
            geometry_type: "POINT",
        },
        GeometryColumn {
            column: "geometry",
            geometry_type: "MULTIPOINT",
        },
    ],
};

pub static BUILDING: TableSpec = TableSpec {
    logical: "building",
    columns: &[
        ColumnSpec::pk("id", ColumnType::Integer),
        ColumnSpec::required("building_id", ColumnType::Integer),
        ColumnSpec::nullable("block_id", ColumnType::Integer),
        ColumnSpec::required("area", ColumnType::Real),
        ColumnSpec::required("geometry", ColumnType::Text),
        ColumnSpec::nullable("minx", ColumnType::Real),
        ColumnSpec::nullable("miny", ColumnType::Real),
        ColumnSpec::nullable("maxx", ColumnType::Real),
        ColumnSpec::nullable("maxy", ColumnType::Real),
    ],
    indexes: &[
        IndexSpec::ordered(&["building_id"]),
        IndexSpec {
            label: &["geometry"],
            on: &["minx", "miny", "maxx", "maxy"],
            kind: IndexKind::Spatial,
        },
    ],
    geometry_columns: &[GeometryColumn {
        column: "geometry",
        geometry_type: "MULTIPOLYGON",
    }],
};

pub static CADASTRAL_PARCEL: TableSpec = TableSpec {
    logical: "cadastral_parcel",
    columns: &[
        ColumnSpec::pk("id", ColumnType::Integer),
        ColumnSpec::required("cadastral_parcel_id", ColumnType::Integer),
        ColumnSpec::required("cadastral_division", ColumnType::Integer),
        ColumnSpec::nullable("municipality_id", ColumnType::Integer),
        ColumnSpec::required("area", ColumnType::Real),
        ColumnSpec::required("parcel_type", ColumnType::Text),
        ColumnSpec::required("parcel_key", ColumnType::Text),
        ColumnSpec::required("geometry", ColumnType::Text),
        ColumnSpec::nullable("minx", ColumnType::Real),
        ColumnSpec::nullable("miny", ColumnType::Real),
        ColumnSpec::nullable("maxx", ColumnType::Real),
        ColumnSpec::nullable("maxy", ColumnType::Real),
    ],
    indexes: &[
        IndexSpec::ordered(&["cadastral_parcel_id"]),
        IndexSpec {
            label: &["geometry"],
            on: &["minx", "miny", "maxx", "maxy"],
            kind: IndexKind::Spatial,
        },
    ],
    geometry_columns: &[GeometryColumn {
        column: "geometry",
        geometry_type: "MULTIPOLYGON",
    }],
};

pub static BUILDING_FACE: TableSpec = TableSpec {
    logical: "building_face",
    columns: &[
        ColumnSpec::pk("id", ColumnType::Integer),
        ColumnSpec::required("building_face_id", ColumnType::Integer),
        ColumnSpec::required("building_solid_id", ColumnType::Integer),
        ColumnSpec::required("kind", ColumnType::Integer),
        ColumnSpec::required("detail_level", ColumnType::Integer),
        ColumnSpec::required("begin_validity", ColumnType::Text),
        ColumnSpec::nullable("end_validity", ColumnType::Text),
        ColumnSpec::required("geometry", ColumnType::Text),
        ColumnSpec::nullable("minx", ColumnType::Real),
        ColumnSpec::nullable("miny", ColumnType::Real),
        ColumnSpec::nullable("maxx", ColumnType::Real),
        ColumnSpec::nullable("maxy", ColumnType::Real),
    ],
    indexes: &[IndexSpec::ordered(&["building_solid_id"])],
    geometry_columns: &[GeometryColumn {
        column: "geometry",
        geometry_type: "MULTIPOLYGON Z",
    }],
};

pub static BUILDING_SOLID: TableSpec = TableSpec {
    logical: "building_solid",
    columns: &[
        ColumnSpec::pk("building_solid_id", ColumnType::Integer),
        ColumnSpec::nullable("point_x", ColumnType::Real),
        ColumnSpec::nullable("point_y", ColumnType::Real),
        ColumnSpec::nullable("point_z", ColumnType::Real),
    ],
    indexes: &[IndexSpec {
        label: &["point"],
        on: &["point_x", "point_y"],
        kind: IndexKind::Spatial,
    }],
    geometry_columns: &[GeometryColumn {
        column: "point",
        geometry_type: "POINT Z",
    }],
};

pub static FORBIDDEN_AREA: TableSpec = TableSpec {
    logical: "forbidden_area",
    columns: &[
        ColumnSpec::pk("id", ColumnType::Integer),
        ColumnSpec::required("geometry", ColumnType::Text),
        ColumnSpec::nullable("minx", ColumnType::Real),
        ColumnSpec::nullable("miny", ColumnType::Real),
        ColumnSpec::nullable("maxx", ColumnType::Real),
        ColumnSpec::nullable("maxy", ColumnType::Real),
    ],
    indexes: &[],
    geometry_columns: &[GeometryColumn {
        column: "geometry",
        geometry_type: "POLYGON",
    }],
};

/// Load order: parcels before addresses is a hard dependency.
pub static PARCEL_AND_BUILDING_TABLES: [&TableSpec; 5] =
    [&CADASTRAL_PARCEL, &ADDRESS, &BUILDING, &MUNICIPALITY, &STREET];

pub static CONSTRUCTION_3D_TABLES: [&TableSpec; 3] =
    [&BUILDING_FACE, &BUILDING_SOLID, &FORBIDDEN_AREA];

/// Binding of one entity to its table's column order.
pub trait TableRow {
    const SPEC: &'static TableSpec;
    fn values(&self) -> Vec<Value>;
}

fn opt_int(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::Integer)
}

fn opt_real(v: Option<f64>) -> Value {
    v.map_or(Value::Null, Value::Real)
}

fn opt_text(v: Option<&str>) -> Value {
    v.map_or(Value::Null, |s| Value::Text(s.to_owned()))
}

fn bbox_values(bbox: Option<(f64, f64, f64, f64)>) -> [Value; 4] {
    match bbox {
        Some((min_x, min_y, max_x, max_y)) => [
            Value::Real(min_x),
            Value::Real(min_y),
            Value::Real(max_x),
            Value::Real(max_y),
        ],
        None => [Value::Null, Value::Null, Value::Null, Value::Null],
    }
}

impl TableRow for Street {
    const SPEC: &'static TableSpec = &STREET;

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.street_id),
            Value::Text(self.name_dutch.clone()),
            Value::Text(self.name_french.clone()),
            Value::Text(self.cleaned_name_dutch.clone()),
            Value::Text(self.cleaned_name_french.clone()),
        ]
    }
}

impl TableRow for Municipality {
    const SPEC: &'static TableSpec = &MUNICIPALITY;

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.municipality_id),
            Value::Text(self.name_dutch.clone()),
            Value::Text(self.name_french.clone()),
        ]
    }
}

impl TableRow for Address {
    const SPEC: &'static TableSpec = &ADDRESS;

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Integer(self.address_id),
            Value::Integer(self.street_id),
            Value::Integer(self.municipality_id),
            opt_int(self.parent_id),
            opt_int(self.cadastral_parcel_id),
            opt_int(self.building_id),
            opt_real(self.carto_angle),
            Value::Integer(self.postal_code as i64),
            Value::Text(self.police_number.clone()),
            opt_text(self.box_number.as_deref()),
            Value::Text(self.stat_nis_code.clone()),
            Value::Real(self.position[0]),
            Value::Real(self.position[1]),
            Value::Text(wkt::multipoint_to_wkt(&self.geometry)),
        ]
    }
}

impl TableRow for Building {
    const SPEC: &'static TableSpec = &BUILDING;

    fn values(&self) -> Vec<Value> {
        let [minx, miny, maxx, maxy] = bbox_values(self.geometry.bbox());
        vec![
            Value::Integer(self.id),
            Value::Integer(self.building_id),
            opt_int(self.block_id),
            Value::Real(self.area),
            Value::Text(wkt::multipolygon_to_wkt(&self.geometry)),
            minx,
            miny,
            maxx,
            maxy,
        ]
    }
}

impl TableRow for CadastralParcel {
    const SPEC: &'static TableSpec = &CADASTRAL_PARCEL;

    fn values(&self) -> Vec<Value> {
        let [minx, miny, maxx, maxy] = bbox_values(self.geometry.bbox());
        vec![
            Value::Integer(self.id),
            Value::Integer(self.cadastral_parcel_id),
            Value::Integer(self.cadastral_division),
            opt_int(self.municipality_id),
            Value::Real(self.area),
            Value::Text(self.parcel_type.clone()),
            Value::Text(self.parcel_key.clone()),
            Value::Text(wkt::multipolygon_to_wkt(&self.geometry)),
            minx,
            miny,
            maxx,
            maxy,
        ]
    }
}

impl TableRow for BuildingFace {
    const SPEC: &'static TableSpec = &BUILDING_FACE;

    fn values(&self) -> Vec<Value> {
        let [minx, miny, maxx, maxy] = bbox_values(self.geometry.bbox_2d());
        vec![
            Value::Integer(self.id),
            Value::Integer(self.building_face_id),
            Value::Integer(self.building_solid_id),
            Value::Integer(self.kind as i64),
            Value::Integer(self.detail_level),
            Value::Text(self.begin_validity.to_string()),
            opt_text(self.end_validity.map(|d| d.to_string()).as_deref()),
            Value::Text(wkt::multipolygon_z_to_wkt(&self.geometry)),
            minx,
            miny,
            maxx,
            maxy,
        ]
    }
}

impl TableRow for BuildingSolid {
    const SPEC: &'static TableSpec = &BUILDING_SOLID;

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.building_solid_id),
            opt_real(self.point.map(|p| p[0])),
            opt_real(self.point.map(|p| p[1])),
            opt_real(self.point.map(|p| p[2])),
        ]
    }
}

impl TableRow for ForbiddenArea {
    const SPEC: &'static TableSpec = &FORBIDDEN_AREA;

    fn values(&self) -> Vec<Value> {
        let [minx, miny, maxx, maxy] = bbox_values(self.polygon.bbox());
        vec![
            Value::Integer(self.id),
            Value::Text(wkt::polygon_to_wkt(&self.polygon)),
            minx,
            miny,
            maxx,
            maxy,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_binding_matches_its_column_count() {
        use chrono::NaiveDate;
        use geomkit::{MultiPolygon2, MultiPolygon3, Polygon2};

        let street = Street {
            street_id: 1,
            name_dutch: "Wetstraat".into(),
            name_french: "Rue de la Loi".into(),
            cleaned_name_dutch: "wetstraat".into(),
            cleaned_name_french: "rue de la loi".into(),
        };
        assert_eq!(street.values().len(), STREET.columns.len());

        let municipality = Municipality {
            municipality_id: 21004,
            name_dutch: "Brussel".into(),
            name_french: "Bruxelles".into(),
        };
        assert_eq!(municipality.values().len(), MUNICIPALITY.columns.len());

        let address = Address {
            id: 1,
            address_id: 2,
            street_id: 3,
            municipality_id: 4,
            parent_id: None,
            cadastral_parcel_id: None,
            building_id: None,
            carto_angle: None,
            postal_code: 1000,
            police_number: "1".into(),
            box_number: None,
            stat_nis_code: "21004".into(),
            position: [0.0, 0.0],
            geometry: vec![[0.0, 0.0]],
        };
        assert_eq!(address.values().len(), ADDRESS.columns.len());

        let building = Building {
            id: 1,
            building_id: 2,
            block_id: None,
            area: 1.0,
            geometry: MultiPolygon2(vec![]),
        };
        assert_eq!(building.values().len(), BUILDING.columns.len());

        let parcel = CadastralParcel {
            id: 1,
            cadastral_parcel_id: 2,
            cadastral_division: 3,
            municipality_id: None,
            area: 1.0,
            parcel_type: "PA".into(),
            parcel_key: "k".into(),
            geometry: MultiPolygon2(vec![]),
        };
        assert_eq!(parcel.values().len(), CADASTRAL_PARCEL.columns.len());

        let face = BuildingFace {
            id: 1,
            building_face_id: 2,
            building_solid_id: 3,
            kind: crate::entities::BuildingFaceKind::WallSurface,
            detail_level: 2,
            begin_validity: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_validity: None,
            geometry: MultiPolygon3(vec![]),
        };
        assert_eq!(face.values().len(), BUILDING_FACE.columns.len());

        let solid = BuildingSolid {
            building_solid_id: 1,
            point: None,
        };
        assert_eq!(solid.values().len(), BUILDING_SOLID.columns.len());

        let area = ForbiddenArea {
            id: 0,
            polygon: Polygon2::from_exterior(vec![]),
        };
        assert_eq!(area.values().len(), FORBIDDEN_AREA.columns.len());
    }

    #[test]
    fn index_names_follow_table_column_convention() {
        let physical = "address__g3";
        let names: Vec<String> = ADDRESS
            .indexes
            .iter()
            .map(|i| i.name(physical))
            .collect();
        assert_eq!(
            names,
            vec![
                "address__g3_address_id",
                "address__g3_street_id",
                "address__g3_position"
            ]
        );
    }

    #[test]
    fn create_sql_declares_all_columns() {
        let sql = BUILDING_SOLID.create_sql("building_solid__g1");
        assert!(sql.contains("\"building_solid_id\" INTEGER PRIMARY KEY"));
        assert!(sql.contains("\"point_z\" REAL"));
        assert!(!sql.contains("point_z\" REAL NOT NULL"));
    }
}
