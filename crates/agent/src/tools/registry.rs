//! Closed set of admin tools.
//!
//! [`TOOL_SPECS`] is the metadata the model sees; [`AdminTool`] is what the executor
//! accepts. [`AdminTool::from_call`] is the only bridge from a model-supplied name.

use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::llm::FunctionDeclaration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolAccess {
    Mutating,
    ReadOnly,
}

impl ToolAccess {
    pub fn description_prefix(&self) -> &'static str {
        match self {
            Self::Mutating => "MODIFICA:",
            Self::ReadOnly => "CONSULTA:",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Array of objects with the given fields.
    ObjectArray(&'static [ParamSpec]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec { name, kind, description, required: true }
}

const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec { name, kind, description, required: false }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub access: ToolAccess,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    pub fn parameters(&self) -> Value {
        object_schema(self.params)
    }

    pub fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters(),
        }
    }
}

fn object_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for param in params {
        properties.insert(param.name.to_string(), param_schema(param));
    }
    let required = params.iter().filter(|param| param.required).map(|param| param.name).collect::<Vec<_>>();

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn param_schema(param: &ParamSpec) -> Value {
    match param.kind {
        ParamKind::String => json!({ "type": "string", "description": param.description }),
        ParamKind::Integer => json!({ "type": "integer", "description": param.description }),
        ParamKind::Number => json!({ "type": "number", "description": param.description }),
        ParamKind::Boolean => json!({ "type": "boolean", "description": param.description }),
        ParamKind::ObjectArray(fields) => json!({
            "type": "array",
            "description": param.description,
            "items": object_schema(fields),
        }),
    }
}

const INGREDIENT_NAME: ParamSpec =
    required("ingredient_name", ParamKind::String, "Nombre del ingrediente, tal como lo dijo el administrador");
const PRODUCT_NAME: ParamSpec =
    required("product_name", ParamKind::String, "Nombre del producto del menú");
const PROMOTION_NAME: ParamSpec =
    required("promotion_name", ParamKind::String, "Nombre de la promoción");
const ORDER_IDENTIFIER: ParamSpec = required(
    "order_identifier",
    ParamKind::String,
    "Número de pedido, nombre o email del cliente, o \"last\" para el pedido más reciente",
);
const PERIOD: ParamSpec =
    required("period", ParamKind::String, "Periodo: today, week o month");
const STOCK_ENTRY: &[ParamSpec] = &[
    INGREDIENT_NAME,
    required("quantity", ParamKind::Integer, "Nuevo stock total, mayor o igual a cero"),
];

pub static TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "update_ingredient_stock",
        description: "MODIFICA: Fija el stock total de un ingrediente al número indicado.",
        access: ToolAccess::Mutating,
        params: &[
            INGREDIENT_NAME,
            required("quantity", ParamKind::Integer, "Nuevo stock total, mayor o igual a cero"),
        ],
    },
    ToolSpec {
        name: "bulk_update_ingredient_stock",
        description: "MODIFICA: Fija el stock de varios ingredientes a la vez. Cada ingrediente se procesa por separado.",
        access: ToolAccess::Mutating,
        params: &[required(
            "updates",
            ParamKind::ObjectArray(STOCK_ENTRY),
            "Lista de ingredientes con su nuevo stock",
        )],
    },
    ToolSpec {
        name: "toggle_ingredient_availability",
        description: "MODIFICA: Marca un ingrediente como disponible o no disponible. Sin is_available, invierte el estado actual.",
        access: ToolAccess::Mutating,
        params: &[
            INGREDIENT_NAME,
            optional("is_available", ParamKind::Boolean, "Disponibilidad deseada"),
        ],
    },
    ToolSpec {
        name: "update_ingredient_info",
        description: "MODIFICA: Cambia nombre, unidad, mínimo de alerta, precio como extra o si se vende como extra.",
        access: ToolAccess::Mutating,
        params: &[
            INGREDIENT_NAME,
            optional("new_name", ParamKind::String, "Nuevo nombre"),
            optional("unit", ParamKind::String, "Unidad de medida"),
            optional("min_stock_alert", ParamKind::Integer, "Stock mínimo antes de alertar"),
            optional("extra_price", ParamKind::Number, "Precio al agregarlo como extra"),
            optional("is_sellable", ParamKind::Boolean, "Si se ofrece como extra"),
        ],
    },
    ToolSpec {
        name: "create_ingredient",
        description: "MODIFICA: Registra un ingrediente nuevo en el inventario.",
        access: ToolAccess::Mutating,
        params: &[
            required("name", ParamKind::String, "Nombre del ingrediente"),
            required("unit", ParamKind::String, "Unidad de medida, por ejemplo kg o porciones"),
            required("stock_quantity", ParamKind::Integer, "Stock inicial"),
            optional("min_stock_alert", ParamKind::Integer, "Stock mínimo antes de alertar"),
            optional("is_sellable", ParamKind::Boolean, "Si se ofrece como extra"),
            optional("extra_price", ParamKind::Number, "Precio al agregarlo como extra"),
        ],
    },
    ToolSpec {
        name: "toggle_product",
        description: "MODIFICA: Activa o desactiva un producto del menú. Sin is_active, invierte el estado actual.",
        access: ToolAccess::Mutating,
        params: &[PRODUCT_NAME, optional("is_active", ParamKind::Boolean, "Estado deseado")],
    },
    ToolSpec {
        name: "toggle_product_featured",
        description: "MODIFICA: Marca o desmarca un producto como destacado. Sin is_featured, invierte el estado actual.",
        access: ToolAccess::Mutating,
        params: &[PRODUCT_NAME, optional("is_featured", ParamKind::Boolean, "Destacado o no")],
    },
    ToolSpec {
        name: "update_product",
        description: "MODIFICA: Cambia precio, nombre, descripción, categoría o stock de un producto.",
        access: ToolAccess::Mutating,
        params: &[
            PRODUCT_NAME,
            optional("new_name", ParamKind::String, "Nuevo nombre"),
            optional("description", ParamKind::String, "Nueva descripción"),
            optional("category", ParamKind::String, "Nueva categoría"),
            optional("price", ParamKind::Number, "Nuevo precio, mayor que cero"),
            optional("stock_quantity", ParamKind::Integer, "Nuevo stock"),
            optional("min_stock_alert", ParamKind::Integer, "Stock mínimo antes de alertar"),
        ],
    },
    ToolSpec {
        name: "create_product",
        description: "MODIFICA: Agrega un producto nuevo al menú.",
        access: ToolAccess::Mutating,
        params: &[
            required("name", ParamKind::String, "Nombre del producto"),
            required("category", ParamKind::String, "Categoría, por ejemplo hamburguesas o bebidas"),
            required("price", ParamKind::Number, "Precio, mayor que cero"),
            optional("description", ParamKind::String, "Descripción"),
            optional("is_combo", ParamKind::Boolean, "Si es un combo que incluye bebida"),
            optional("principal_ingredient", ParamKind::String, "Ingrediente que no se puede quitar"),
            optional("stock_quantity", ParamKind::Integer, "Stock si se controla por unidades"),
        ],
    },
    ToolSpec {
        name: "delete_product",
        description: "MODIFICA: Elimina un producto del menú de forma permanente.",
        access: ToolAccess::Mutating,
        params: &[PRODUCT_NAME],
    },
    ToolSpec {
        name: "get_product_details",
        description: "CONSULTA: Muestra precio, categoría, estado y stock de un producto. No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[PRODUCT_NAME],
    },
    ToolSpec {
        name: "toggle_promotion",
        description: "MODIFICA: Activa o desactiva una promoción. Sin is_active, invierte el estado actual.",
        access: ToolAccess::Mutating,
        params: &[PROMOTION_NAME, optional("is_active", ParamKind::Boolean, "Estado deseado")],
    },
    ToolSpec {
        name: "create_promotion",
        description: "MODIFICA: Crea una promoción nueva, activa desde ahora.",
        access: ToolAccess::Mutating,
        params: &[
            required("name", ParamKind::String, "Nombre de la promoción"),
            required("discount_type", ParamKind::String, "percentage o fixed"),
            required("discount_value", ParamKind::Number, "Porcentaje (1-100) o monto fijo"),
            optional("min_purchase", ParamKind::Number, "Compra mínima para aplicar"),
            optional("description", ParamKind::String, "Descripción"),
        ],
    },
    ToolSpec {
        name: "update_promotion",
        description: "MODIFICA: Cambia nombre, descripción, tipo, valor o compra mínima de una promoción.",
        access: ToolAccess::Mutating,
        params: &[
            PROMOTION_NAME,
            optional("new_name", ParamKind::String, "Nuevo nombre"),
            optional("description", ParamKind::String, "Nueva descripción"),
            optional("discount_type", ParamKind::String, "percentage o fixed"),
            optional("discount_value", ParamKind::Number, "Nuevo valor del descuento"),
            optional("min_purchase", ParamKind::Number, "Nueva compra mínima"),
        ],
    },
    ToolSpec {
        name: "delete_promotion",
        description: "MODIFICA: Elimina una promoción de forma permanente.",
        access: ToolAccess::Mutating,
        params: &[PROMOTION_NAME],
    },
    ToolSpec {
        name: "update_order_status",
        description: "MODIFICA: Cambia el estado de un pedido (pending, confirmed, preparing, ready, delivered, cancelled).",
        access: ToolAccess::Mutating,
        params: &[ORDER_IDENTIFIER, required("status", ParamKind::String, "Nuevo estado")],
    },
    ToolSpec {
        name: "get_order_details",
        description: "CONSULTA: Muestra cliente, productos, total y estado de un pedido. No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[ORDER_IDENTIFIER],
    },
    ToolSpec {
        name: "get_active_orders",
        description: "CONSULTA: Lista los pedidos que aún no se entregan ni se cancelan. No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[],
    },
    ToolSpec {
        name: "analyze_stock",
        description: "CONSULTA: Revisa productos e ingredientes agotados o con stock bajo. No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[],
    },
    ToolSpec {
        name: "get_sales_by_period",
        description: "CONSULTA: Resume pedidos, ingresos, ticket promedio y productos más vendidos del periodo. No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[PERIOD],
    },
    ToolSpec {
        name: "get_product_sales",
        description: "CONSULTA: Unidades vendidas e ingresos de un producto en el periodo (por defecto, la semana). No cambia nada.",
        access: ToolAccess::ReadOnly,
        params: &[PRODUCT_NAME, optional("period", ParamKind::String, "Periodo: today, week o month")],
    },
];

pub fn function_declarations() -> Vec<FunctionDeclaration> {
    TOOL_SPECS.iter().map(ToolSpec::declaration).collect()
}

pub fn spec_for(name: &str) -> Option<&'static ToolSpec> {
    TOOL_SPECS.iter().find(|spec| spec.name == name)
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdateIngredientStockArgs {
    pub ingredient_name: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BulkUpdateIngredientStockArgs {
    pub updates: Vec<UpdateIngredientStockArgs>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToggleIngredientAvailabilityArgs {
    pub ingredient_name: String,
    #[serde(default)]
    pub is_available: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdateIngredientInfoArgs {
    pub ingredient_name: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub min_stock_alert: Option<i64>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub extra_price: Option<Decimal>,
    #[serde(default)]
    pub is_sellable: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreateIngredientArgs {
    pub name: String,
    pub unit: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub stock_quantity: i64,
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub min_stock_alert: Option<i64>,
    #[serde(default)]
    pub is_sellable: Option<bool>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub extra_price: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToggleProductArgs {
    pub product_name: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToggleProductFeaturedArgs {
    pub product_name: String,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdateProductArgs {
    pub product_name: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub stock_quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub min_stock_alert: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreateProductArgs {
    pub name: String,
    pub category: String,
    #[serde(deserialize_with = "lenient_decimal")]
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_combo: Option<bool>,
    #[serde(default)]
    pub principal_ingredient: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub stock_quantity: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProductNameArgs {
    pub product_name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TogglePromotionArgs {
    pub promotion_name: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreatePromotionArgs {
    pub name: String,
    pub discount_type: String,
    #[serde(deserialize_with = "lenient_decimal")]
    pub discount_value: Decimal,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub min_purchase: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdatePromotionArgs {
    pub promotion_name: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discount_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub discount_value: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub min_purchase: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PromotionNameArgs {
    pub promotion_name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdateOrderStatusArgs {
    pub order_identifier: String,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OrderIdentifierArgs {
    pub order_identifier: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SalesByPeriodArgs {
    pub period: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProductSalesArgs {
    pub product_name: String,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdminTool {
    UpdateIngredientStock(UpdateIngredientStockArgs),
    BulkUpdateIngredientStock(BulkUpdateIngredientStockArgs),
    ToggleIngredientAvailability(ToggleIngredientAvailabilityArgs),
    UpdateIngredientInfo(UpdateIngredientInfoArgs),
    CreateIngredient(CreateIngredientArgs),
    ToggleProduct(ToggleProductArgs),
    ToggleProductFeatured(ToggleProductFeaturedArgs),
    UpdateProduct(UpdateProductArgs),
    CreateProduct(CreateProductArgs),
    DeleteProduct(ProductNameArgs),
    GetProductDetails(ProductNameArgs),
    TogglePromotion(TogglePromotionArgs),
    CreatePromotion(CreatePromotionArgs),
    UpdatePromotion(UpdatePromotionArgs),
    DeletePromotion(PromotionNameArgs),
    UpdateOrderStatus(UpdateOrderStatusArgs),
    GetOrderDetails(OrderIdentifierArgs),
    GetActiveOrders,
    AnalyzeStock,
    GetSalesByPeriod(SalesByPeriodArgs),
    GetProductSales(ProductSalesArgs),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("herramienta desconocida `{0}`")]
    UnknownTool(String),
    #[error("argumentos inválidos para `{tool}`: {message}")]
    InvalidArguments { tool: String, message: String },
}

impl AdminTool {
    pub fn from_call(name: &str, args: &Value) -> Result<Self, ToolCallError> {
        let tool = match name {
            "update_ingredient_stock" => Self::UpdateIngredientStock(parse_args(name, args)?),
            "bulk_update_ingredient_stock" => {
                Self::BulkUpdateIngredientStock(parse_args(name, args)?)
            }
            "toggle_ingredient_availability" => {
                Self::ToggleIngredientAvailability(parse_args(name, args)?)
            }
            "update_ingredient_info" => Self::UpdateIngredientInfo(parse_args(name, args)?),
            "create_ingredient" => Self::CreateIngredient(parse_args(name, args)?),
            "toggle_product" => Self::ToggleProduct(parse_args(name, args)?),
            "toggle_product_featured" => Self::ToggleProductFeatured(parse_args(name, args)?),
            "update_product" => Self::UpdateProduct(parse_args(name, args)?),
            "create_product" => Self::CreateProduct(parse_args(name, args)?),
            "delete_product" => Self::DeleteProduct(parse_args(name, args)?),
            "get_product_details" => Self::GetProductDetails(parse_args(name, args)?),
            "toggle_promotion" => Self::TogglePromotion(parse_args(name, args)?),
            "create_promotion" => Self::CreatePromotion(parse_args(name, args)?),
            "update_promotion" => Self::UpdatePromotion(parse_args(name, args)?),
            "delete_promotion" => Self::DeletePromotion(parse_args(name, args)?),
            "update_order_status" => Self::UpdateOrderStatus(parse_args(name, args)?),
            "get_order_details" => Self::GetOrderDetails(parse_args(name, args)?),
            "get_active_orders" => Self::GetActiveOrders,
            "analyze_stock" => Self::AnalyzeStock,
            "get_sales_by_period" => Self::GetSalesByPeriod(parse_args(name, args)?),
            "get_product_sales" => Self::GetProductSales(parse_args(name, args)?),
            other => return Err(ToolCallError::UnknownTool(other.to_string())),
        };
        Ok(tool)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateIngredientStock(_) => "update_ingredient_stock",
            Self::BulkUpdateIngredientStock(_) => "bulk_update_ingredient_stock",
            Self::ToggleIngredientAvailability(_) => "toggle_ingredient_availability",
            Self::UpdateIngredientInfo(_) => "update_ingredient_info",
            Self::CreateIngredient(_) => "create_ingredient",
            Self::ToggleProduct(_) => "toggle_product",
            Self::ToggleProductFeatured(_) => "toggle_product_featured",
            Self::UpdateProduct(_) => "update_product",
            Self::CreateProduct(_) => "create_product",
            Self::DeleteProduct(_) => "delete_product",
            Self::GetProductDetails(_) => "get_product_details",
            Self::TogglePromotion(_) => "toggle_promotion",
            Self::CreatePromotion(_) => "create_promotion",
            Self::UpdatePromotion(_) => "update_promotion",
            Self::DeletePromotion(_) => "delete_promotion",
            Self::UpdateOrderStatus(_) => "update_order_status",
            Self::GetOrderDetails(_) => "get_order_details",
            Self::GetActiveOrders => "get_active_orders",
            Self::AnalyzeStock => "analyze_stock",
            Self::GetSalesByPeriod(_) => "get_sales_by_period",
            Self::GetProductSales(_) => "get_product_sales",
        }
    }

    pub fn access(&self) -> ToolAccess {
        spec_for(self.name()).map_or(ToolAccess::Mutating, |spec| spec.access)
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolCallError> {
    let args = if args.is_null() { Value::Object(Map::new()) } else { args.clone() };
    serde_json::from_value(args).map_err(|error| ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        message: error.to_string(),
    })
}

fn integer_from_value<E: de::Error>(value: &Value) -> Result<i64, E> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64))
            .ok_or_else(|| E::custom(format!("se esperaba un entero, llegó {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| E::custom(format!("se esperaba un entero, llegó `{text}`"))),
        other => Err(E::custom(format!("se esperaba un entero, llegó {other}"))),
    }
}

fn decimal_from_value<E: de::Error>(value: &Value) -> Result<Decimal, E> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().trim_start_matches('$').to_string(),
        other => return Err(E::custom(format!("se esperaba un número, llegó {other}"))),
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| E::custom(format!("se esperaba un número, llegó `{text}`")))
}

/// Models send `50`, `50.0` or `"50"` for the same integer.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    integer_from_value(&Value::deserialize(deserializer)?)
}

fn lenient_optional_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => integer_from_value(&value).map(Some),
    }
}

fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    decimal_from_value(&Value::deserialize(deserializer)?)
}

fn lenient_optional_decimal<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Decimal>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decimal_from_value(&value).map(Some),
    }
}
