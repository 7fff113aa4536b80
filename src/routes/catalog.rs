use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProductType {
    pub value: &'static str,
    pub label: &'static str,
}

pub const PRODUCT_TYPES: &[ProductType] = &[
    ProductType {
        value: "cartoes-visita",
        label: "Cartões de visita",
    },
    ProductType {
        value: "flyers",
        label: "Flyers",
    },
    ProductType {
        value: "cartazes",
        label: "Cartazes",
    },
    ProductType {
        value: "banners",
        label: "Banners e lonas",
    },
    ProductType {
        value: "autocolantes",
        label: "Autocolantes",
    },
    ProductType {
        value: "brochuras",
        label: "Brochuras e catálogos",
    },
    ProductType {
        value: "outro",
        label: "Outro",
    },
];

pub async fn product_types() -> Json<&'static [ProductType]> {
    Json(PRODUCT_TYPES)
}
