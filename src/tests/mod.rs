#[cfg(test)]
mod common;


#[cfg(test)]
mod proof_test;

#[cfg(test)]
mod lattice_test;

#[cfg(test)]
mod syntax_test;
