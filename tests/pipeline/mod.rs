mod postgres_pipeline;
mod shutdown;
