pub mod star_schema;
