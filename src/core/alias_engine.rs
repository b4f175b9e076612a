use anyhow::bail;
use fst::{Map, MapBuilder};
use std::collections::BTreeMap;

use crate::core::normalizer::is_canonical;

/// 数据集中已知的规范字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Location,
    ProductId,
    ActualQuantity,
    PlannedQuantity,
    PlannedPrice,
    ActualPrice,
    PromotionType,
    ServiceLevel,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Location,
        CanonicalField::ProductId,
        CanonicalField::ActualQuantity,
        CanonicalField::PlannedQuantity,
        CanonicalField::PlannedPrice,
        CanonicalField::ActualPrice,
        CanonicalField::PromotionType,
        CanonicalField::ServiceLevel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Location => "location",
            CanonicalField::ProductId => "product_id",
            CanonicalField::ActualQuantity => "actual_quantity",
            CanonicalField::PlannedQuantity => "planned_quantity",
            CanonicalField::PlannedPrice => "planned_price",
            CanonicalField::ActualPrice => "actual_price",
            CanonicalField::PromotionType => "promotion_type",
            CanonicalField::ServiceLevel => "service_level",
        }
    }
}

/// 同义词 (结构归一化之后的小写形式) → 规范字段
pub const COLUMN_ALIASES: &[(&str, CanonicalField)] = &[
    ("local", CanonicalField::Location),
    ("produto", CanonicalField::ProductId),
    ("produto_id", CanonicalField::ProductId),
    ("productid", CanonicalField::ProductId),
    ("actualquantity", CanonicalField::ActualQuantity),
    ("plannedquantity", CanonicalField::PlannedQuantity),
    ("plannedprice", CanonicalField::PlannedPrice),
    ("actualprice", CanonicalField::ActualPrice),
    ("promotiontype", CanonicalField::PromotionType),
    ("servicelevel", CanonicalField::ServiceLevel),
];

/// 列名别名表，启动时构建一次，之后只读
pub struct AliasEngine {
    index: Map<Vec<u8>>,
    canonical: Vec<String>,
}

impl AliasEngine {
    pub fn standard() -> anyhow::Result<Self> {
        let pairs: Vec<(&str, &str)> = COLUMN_ALIASES
            .iter()
            .map(|(alias, field)| (*alias, field.as_str()))
            .collect();
        Self::build(&pairs)
    }

    pub fn build(aliases: &[(&str, &str)]) -> anyhow::Result<Self> {
        let mut canonical: Vec<String> = Vec::new();
        // FST 键必须有序
        let mut data: BTreeMap<String, u64> = BTreeMap::new();

        for (alias, target) in aliases {
            if !is_canonical(target) {
                bail!("别名目标不是规范字段名: {}", target);
            }
            let id = match canonical.iter().position(|c| c == target) {
                Some(pos) => pos,
                None => {
                    canonical.push(target.to_string());
                    canonical.len() - 1
                }
            };
            data.insert(alias.to_lowercase(), id as u64);
        }

        let mut builder = MapBuilder::memory();
        for (key, id) in data {
            builder.insert(key, id)?;
        }

        let bytes = builder.into_inner()?;
        Ok(Self {
            index: Map::new(bytes)?,
            canonical,
        })
    }

    /// 精确匹配已归一化的列名
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let id = self.index.get(name)?;
        self.canonical.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
