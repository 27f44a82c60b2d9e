mod read;
mod write;

pub(crate) use read::parse_date;
