mod offset;
mod pg_store;
mod pipeline;
mod usage;
