#![no_main]
use libfuzzer_sys::fuzz_target;

// Input is a schema document and an instance separated by a NUL byte.
fuzz_target!(|data: &[u8]| {
    let split = match data.iter().position(|b| *b == 0) {
        Some(split) => split,
        None => return,
    };

    let (raw_schema, raw_instance) = (&data[..split], &data[split + 1..]);

    // We're only interested in fuzzing against valid schemas.
    let schema = match serde_json::from_slice::<serde_json::Value>(raw_schema)
        .ok()
        .and_then(|raw| bsonschema::Schema::compile(&raw).ok())
    {
        Some(schema) => schema,
        None => return,
    };

    if let Ok(instance) = serde_json::from_slice::<serde_json::Value>(raw_instance) {
        let verified = schema.verify(&instance).is_ok();
        let collected = bsonschema::validate(
            &schema,
            &instance,
            bsonschema::ValidateOptions::new().with_max_depth(256),
        );

        if let Ok(errors) = collected {
            assert_eq!(verified, errors.is_empty());
        }
    }
});
