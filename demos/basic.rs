use adhoq::*;
use serde_json::json;

fn main() -> Result<(), AdhoqError> {
    // 1. Build an in-memory data source
    let source = MemoryDataSource::new().with_collection(
        "crm",
        "people",
        records_from_json(&json!([
            { "_id": 1, "name": "Alice", "age": 30, "admin": true,  "joined": "2024-03-05T10:15:00Z" },
            { "_id": 2, "name": "Bob",   "age": 40, "admin": false, "joined": "2023-11-20T08:00:00Z" },
            { "_id": 3, "name": "Carol", "age": 50, "admin": true,  "joined": "2024-06-30T23:59:59Z" },
        ])),
    );

    // 2. Open a session and pick a collection
    let mut session = QuerySession::new(source);
    session.select_database("crm")?;
    session.select_collection("people")?;
    println!("fields: {:?}", session.field_names());
    println!("age is inferred as: {}", session.kind_of("age"));

    // 3. Pick display fields and aggregations
    session.toggle_field("age");
    session.set_operation("age", AggregateOp::Avg)?;
    session.toggle_field("admin");
    session.set_operation("admin", AggregateOp::Percentage)?;

    // 4. Filter and run
    session.add_filter(Filter::new("admin", "equals", "true"));
    session.run()?;

    // 5. Read the results
    println!("matched {} records", session.rows().len());
    for (field, value) in session.result().expect("just ran").iter() {
        println!("{} -> {:?}", field, value);
    }
    Ok(())
}
