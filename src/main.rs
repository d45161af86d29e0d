fn main() {
    todotips_lib::run()
}
