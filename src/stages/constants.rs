//! Add-constants stage: appends fixed values to every incoming row.

use crate::assembler::FieldSpec;
use crate::row::{FieldMeta, RowShape, Value};
use crate::stage::{Stage, StageContext, StageStatus};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// One appended field: its spec plus the raw text converted once at init.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantField {
    #[serde(flatten)]
    pub spec: FieldSpec,
    #[serde(default)]
    pub value: String,
}

impl ConstantField {
    pub fn new<S: Into<String>>(spec: FieldSpec, value: S) -> Self {
        Self {
            spec,
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantsConfig {
    pub fields: Vec<ConstantField>,
}

/// Extends each row with the configured constants.
pub struct AddConstants {
    config: ConstantsConfig,
    values: Vec<Value>,
}

impl AddConstants {
    pub fn new(config: ConstantsConfig) -> Self {
        Self {
            config,
            values: Vec::new(),
        }
    }
}

impl Stage for AddConstants {
    fn init(&mut self, input: &RowShape) -> Result<RowShape> {
        self.values = self
            .config
            .fields
            .iter()
            .map(|f| {
                f.spec.convert(&f.value).map_err(|reason| {
                    anyhow!("constant {} = {:?}: {reason}", f.spec.name, f.value)
                })
            })
            .collect::<Result<_>>()?;
        Ok(input.extended(
            self.config
                .fields
                .iter()
                .map(|f| FieldMeta::new(f.spec.name.clone(), f.spec.value_type)),
        ))
    }

    fn process(&mut self, ctx: &mut StageContext) -> Result<StageStatus> {
        match ctx.get_row()? {
            Some(mut row) => {
                row.extend(self.values.iter().cloned());
                ctx.put_row(row)?;
                Ok(StageStatus::Continue)
            }
            None => Ok(StageStatus::Finished),
        }
    }
}
