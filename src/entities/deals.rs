use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,                           // HubSpot id, or epoch millis for locally created deals
    #[sea_orm(column_type = "Text", nullable)]
    pub dealname: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub amount: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub pipeline: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub dealstage: Option<String>,
    pub createdate: Option<DateTime<Utc>>,
    pub hs_lastmodifieddate: Option<DateTime<Utc>>,
    pub closedate: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: Json,                  // full raw properties blob
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
