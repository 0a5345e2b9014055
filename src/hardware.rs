pub mod ltc5594;
pub mod merlin2b;
