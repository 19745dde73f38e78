//! FILENAME: crosstab-engine/src/dereference.rs
//! Replaces raw relation keys in result rows with the objects they name.

use rustc_hash::FxHashMap;

use engine::{CellValue, Database, EngineResult, ObjectRef, ResultRow};

/// For every relation among `fields`, swaps the stored key in each row for
/// the related object. Scalar fields and empty keys are left alone.
pub fn dereference_values(db: &Database, model: &str, fields: &[String], rows: &mut [ResultRow]) -> EngineResult<()> {
    for field in fields {
        let def = db.schema().get_field(model, field)?;
        let Some(related) = def.related_model() else {
            continue;
        };

        let mut seen: FxHashMap<i64, ObjectRef> = FxHashMap::default();
        for row in rows.iter_mut() {
            let pk = match row.get(field) {
                CellValue::Integer(pk) => *pk,
                _ => continue,
            };
            let object = match seen.get(&pk) {
                Some(object) => object.clone(),
                None => {
                    let object = db.object_ref(related, pk)?;
                    seen.insert(pk, object.clone());
                    object
                }
            };
            row.set(field.clone(), CellValue::Object(object));
        }
    }
    Ok(())
}
