pub mod merlin2;
