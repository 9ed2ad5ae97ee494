mod arbitrary;
mod fixtures;
mod materialize;
